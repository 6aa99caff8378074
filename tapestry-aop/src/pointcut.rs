//! 切点（Pointcut）表达式系统
//!
//! 文本形式的切点表达式在注册期一次性编译为不可变匹配器，
//! 对方法签名的匹配是纯函数：同一签名永远得到同一结果
//!
//! 语法：
//!
//! ```text
//! execution(modifiers? return-type declaring-type-pattern ".."? "." method-name-pattern "(" param-pattern ")" throws-pattern?)
//! ```
//!
//! - `*` 匹配任意单个名称段（返回类型、声明类型的一段、或整个方法名）
//! - 声明类型后紧跟 `..` 表示「该作用域及其全部嵌套作用域」
//! - 参数位置单独的 `..` 表示「任意个数、任意类型」；显式参数列表要求
//!   精确的个数与逐位置匹配
//! - `throws 模式` 可选，匹配签名声明的错误类型

use crate::capability::MethodSignature;
use crate::error::{WeaveError, WeaveResult};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// 语法兼容而接受的修饰符（编译后的匹配器不保留修饰符字段）
const MODIFIER_TOKENS: &[&str] = &["public", "protected", "private", "static", "pub"];

/// 单个名称段的模式
#[derive(Debug, Clone)]
enum NamePattern {
    /// `*`：匹配任意名称
    Any,

    /// 精确名称
    Literal(String),

    /// 段内通配，如 `get*`、`*Service`
    Glob(Regex),
}

impl NamePattern {
    fn compile(token: &str, expression: &str) -> WeaveResult<Self> {
        if token == "*" {
            return Ok(NamePattern::Any);
        }
        if token
            .chars()
            .any(|c| !c.is_alphanumeric() && c != '_' && c != '*')
        {
            return Err(WeaveError::parse(
                expression,
                format!("invalid pattern token '{}'", token),
            ));
        }
        if !token.contains('*') {
            return Ok(NamePattern::Literal(token.to_string()));
        }

        // 段内 `*` 展开为正则，锚定整段；相邻 split 片段之间各插入一个通配
        let mut pattern = String::from("^");
        for (i, part) in token.split('*').enumerate() {
            if i > 0 {
                pattern.push_str("[^.]*");
            }
            pattern.push_str(&regex::escape(part));
        }
        pattern.push('$');
        let regex = Regex::new(&pattern)
            .map_err(|e| WeaveError::parse(expression, format!("bad wildcard pattern: {}", e)))?;
        Ok(NamePattern::Glob(regex))
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Any => true,
            NamePattern::Literal(literal) => literal == name,
            NamePattern::Glob(regex) => regex.is_match(name),
        }
    }
}

/// 参数列表的模式
#[derive(Debug, Clone)]
enum ParamPattern {
    /// `..`：任意个数、任意类型
    AnyArgs,

    /// 精确个数，逐位置匹配
    Exact(Vec<NamePattern>),
}

/// 编译后的切点表达式
///
/// 注册期编译一次，之后只读；匹配对所有签名全定义、无歧义。
/// 语义等价但文本不同的两个表达式不做去重，各绑定保留自己的匹配器
#[derive(Clone)]
pub struct PointcutExpression {
    text: String,
    return_type: NamePattern,
    declaring_type: Vec<NamePattern>,
    include_nested: bool,
    method_name: NamePattern,
    params: ParamPattern,
    throws: Option<NamePattern>,
}

impl PointcutExpression {
    /// 编译一条切点表达式文本
    ///
    /// 语法违例在此处立即失败，绝不会推迟到调用时
    pub fn parse(text: &str) -> WeaveResult<Self> {
        let trimmed = text.trim();
        let open = trimmed
            .find('(')
            .ok_or_else(|| WeaveError::parse(trimmed, "expected '(' after pointcut kind"))?;
        let kind = trimmed[..open].trim();
        if kind.is_empty() {
            return Err(WeaveError::parse(trimmed, "missing pointcut kind"));
        }
        if kind != "execution" {
            return Err(WeaveError::parse(
                trimmed,
                format!("unsupported pointcut kind '{}'", kind),
            ));
        }
        if !trimmed.ends_with(')') {
            return Err(WeaveError::parse(trimmed, "expected closing ')'"));
        }
        let body = trimmed[open + 1..trimmed.len() - 1].trim();
        if body.is_empty() {
            return Err(WeaveError::parse(trimmed, "empty pointcut body"));
        }

        // 参数列表
        let params_open = body
            .find('(')
            .ok_or_else(|| WeaveError::parse(trimmed, "expected parameter pattern"))?;
        let params_close = body[params_open..]
            .find(')')
            .map(|i| params_open + i)
            .ok_or_else(|| WeaveError::parse(trimmed, "unterminated parameter pattern"))?;
        let head = body[..params_open].trim_end();
        let params_text = body[params_open + 1..params_close].trim();
        let tail = body[params_close + 1..].trim();

        // throws 模式
        let throws = if tail.is_empty() {
            None
        } else {
            let pattern = tail.strip_prefix("throws").ok_or_else(|| {
                WeaveError::parse(trimmed, format!("unexpected trailing text '{}'", tail))
            })?;
            let pattern = pattern.trim();
            if pattern.is_empty() {
                return Err(WeaveError::parse(trimmed, "expected pattern after 'throws'"));
            }
            Some(NamePattern::compile(pattern, trimmed)?)
        };

        // 修饰符 / 返回类型 / 声明类型.方法名
        let mut tokens: Vec<&str> = head.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(WeaveError::parse(
                trimmed,
                "expected return type and method pattern",
            ));
        }
        let target = tokens.pop().unwrap();
        let return_token = tokens.pop().unwrap();
        for modifier in tokens {
            if !MODIFIER_TOKENS.contains(&modifier) {
                return Err(WeaveError::parse(
                    trimmed,
                    format!("unknown modifier '{}'", modifier),
                ));
            }
        }
        let return_type = NamePattern::compile(return_token, trimmed)?;

        // `..` 只允许紧跟在声明类型模式之后，方法名模式跟在其后
        let (declaring, method, include_nested) = if let Some(marker) = target.find("..") {
            let declaring = &target[..marker];
            let method = target[marker + 2..].strip_prefix('.').unwrap_or(&target[marker + 2..]);
            if method.contains('.') {
                return Err(WeaveError::parse(
                    trimmed,
                    "'..' is only valid immediately after the declaring type pattern",
                ));
            }
            (declaring, method, true)
        } else {
            let (declaring, method) = target.rsplit_once('.').ok_or_else(|| {
                WeaveError::parse(trimmed, "expected declaring type pattern before method name")
            })?;
            (declaring, method, false)
        };
        if method.is_empty() {
            return Err(WeaveError::parse(trimmed, "missing method name pattern"));
        }
        let method_name = NamePattern::compile(method, trimmed)?;

        if declaring.is_empty() {
            return Err(WeaveError::parse(trimmed, "missing declaring type pattern"));
        }
        let mut declaring_type = Vec::new();
        for segment in declaring.split('.') {
            if segment.is_empty() {
                return Err(WeaveError::parse(trimmed, "empty declaring type segment"));
            }
            declaring_type.push(NamePattern::compile(segment, trimmed)?);
        }

        // 参数模式
        let params = if params_text == ".." {
            ParamPattern::AnyArgs
        } else if params_text.is_empty() {
            ParamPattern::Exact(Vec::new())
        } else {
            let mut patterns = Vec::new();
            for token in params_text.split(',') {
                let token = token.trim();
                if token == ".." {
                    return Err(WeaveError::parse(
                        trimmed,
                        "'..' must be the sole parameter pattern",
                    ));
                }
                if token.is_empty() {
                    return Err(WeaveError::parse(trimmed, "empty parameter pattern"));
                }
                patterns.push(NamePattern::compile(token, trimmed)?);
            }
            ParamPattern::Exact(patterns)
        };

        Ok(Self {
            text: trimmed.to_string(),
            return_type,
            declaring_type,
            include_nested,
            method_name,
            params,
            throws,
        })
    }

    /// 判断方法签名是否匹配
    ///
    /// 纯函数：对任意签名全定义，匹配与否没有部分/歧义结果
    pub fn matches(&self, signature: &MethodSignature) -> bool {
        if !self.return_type.matches(&signature.return_type) {
            return false;
        }
        if !self.method_name.matches(&signature.name) {
            return false;
        }

        let segments: Vec<&str> = signature.declaring_type.split('.').collect();
        if self.include_nested {
            if segments.len() < self.declaring_type.len() {
                return false;
            }
        } else if segments.len() != self.declaring_type.len() {
            return false;
        }
        for (pattern, segment) in self.declaring_type.iter().zip(&segments) {
            if !pattern.matches(segment) {
                return false;
            }
        }

        match &self.params {
            ParamPattern::AnyArgs => {}
            ParamPattern::Exact(patterns) => {
                if patterns.len() != signature.parameter_types.len() {
                    return false;
                }
                for (pattern, parameter) in patterns.iter().zip(&signature.parameter_types) {
                    if !pattern.matches(parameter) {
                        return false;
                    }
                }
            }
        }

        if let Some(throws) = &self.throws {
            if !signature.error_types.iter().any(|e| throws.matches(e)) {
                return false;
            }
        }

        true
    }

    /// 表达式原文
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for PointcutExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PointcutExpression({})", self.text)
    }
}

impl fmt::Display for PointcutExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// 切点：表达式或表达式的布尔组合
#[derive(Clone)]
pub enum Pointcut {
    /// 单条编译后的表达式
    Expression(Arc<PointcutExpression>),

    /// 与运算（AND）
    And(Box<Pointcut>, Box<Pointcut>),

    /// 或运算（OR）
    Or(Box<Pointcut>, Box<Pointcut>),

    /// 非运算（NOT）
    Not(Box<Pointcut>),
}

impl Pointcut {
    /// 编译一条表达式文本为切点
    pub fn parse(text: &str) -> WeaveResult<Self> {
        Ok(Pointcut::Expression(Arc::new(PointcutExpression::parse(
            text,
        )?)))
    }

    /// 判断方法签名是否匹配
    pub fn matches(&self, signature: &MethodSignature) -> bool {
        match self {
            Pointcut::Expression(expression) => expression.matches(signature),
            Pointcut::And(left, right) => left.matches(signature) && right.matches(signature),
            Pointcut::Or(left, right) => left.matches(signature) || right.matches(signature),
            Pointcut::Not(inner) => !inner.matches(signature),
        }
    }

    /// 与运算
    pub fn and(self, other: Pointcut) -> Self {
        Pointcut::And(Box::new(self), Box::new(other))
    }

    /// 或运算
    pub fn or(self, other: Pointcut) -> Self {
        Pointcut::Or(Box::new(self), Box::new(other))
    }

    /// 非运算
    pub fn not(self) -> Self {
        Pointcut::Not(Box::new(self))
    }
}

impl From<PointcutExpression> for Pointcut {
    fn from(expression: PointcutExpression) -> Self {
        Pointcut::Expression(Arc::new(expression))
    }
}

impl fmt::Debug for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pointcut::Expression(e) => write!(f, "{:?}", e),
            Pointcut::And(l, r) => write!(f, "And({:?}, {:?})", l, r),
            Pointcut::Or(l, r) => write!(f, "Or({:?}, {:?})", l, r),
            Pointcut::Not(e) => write!(f, "Not({:?})", e),
        }
    }
}

/// 切点来源：文本（注册时编译）或已编译的切点
pub enum PointcutSource {
    Text(String),
    Compiled(Pointcut),
}

impl From<&str> for PointcutSource {
    fn from(text: &str) -> Self {
        PointcutSource::Text(text.to_string())
    }
}

impl From<String> for PointcutSource {
    fn from(text: String) -> Self {
        PointcutSource::Text(text)
    }
}

impl From<Pointcut> for PointcutSource {
    fn from(pointcut: Pointcut) -> Self {
        PointcutSource::Compiled(pointcut)
    }
}

impl From<PointcutExpression> for PointcutSource {
    fn from(expression: PointcutExpression) -> Self {
        PointcutSource::Compiled(expression.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(
        return_type: &str,
        declaring_type: &str,
        name: &str,
        parameters: &[&str],
    ) -> MethodSignature {
        MethodSignature::new(return_type, declaring_type, name, parameters.iter().copied())
    }

    #[test]
    fn test_exact_match() {
        let pc =
            PointcutExpression::parse("execution(i64 billing.InvoiceService.total(i64, i64))")
                .unwrap();

        assert!(pc.matches(&sig("i64", "billing.InvoiceService", "total", &["i64", "i64"])));
        // 个数不符
        assert!(!pc.matches(&sig("i64", "billing.InvoiceService", "total", &["i64"])));
        // 类型不符
        assert!(!pc.matches(&sig("i64", "billing.InvoiceService", "total", &["i64", "f64"])));
        // 返回类型不符
        assert!(!pc.matches(&sig("f64", "billing.InvoiceService", "total", &["i64", "i64"])));
        // 方法名不符
        assert!(!pc.matches(&sig("i64", "billing.InvoiceService", "sum", &["i64", "i64"])));
    }

    #[test]
    fn test_wildcard_method_and_return() {
        let pc = PointcutExpression::parse("execution(* billing.InvoiceService.*(..))").unwrap();

        assert!(pc.matches(&sig("i64", "billing.InvoiceService", "total", &["i64", "i64"])));
        assert!(pc.matches(&sig("void", "billing.InvoiceService", "reset", &[])));
        assert!(!pc.matches(&sig("i64", "billing.TaxService", "total", &[])));
        // `*` 只匹配单个名称段
        assert!(!pc.matches(&sig("i64", "billing.sub.InvoiceService", "total", &[])));
    }

    #[test]
    fn test_partial_wildcard_segments() {
        let pc = PointcutExpression::parse("execution(* billing.*Service.get*(..))").unwrap();

        assert!(pc.matches(&sig("User", "billing.InvoiceService", "get_user", &["u32"])));
        assert!(pc.matches(&sig("User", "billing.TaxService", "get", &[])));
        assert!(!pc.matches(&sig("User", "billing.InvoiceRepo", "get_user", &["u32"])));
        assert!(!pc.matches(&sig("User", "billing.InvoiceService", "find_user", &["u32"])));
    }

    #[test]
    fn test_wildcard_position_within_segment() {
        // 前置、中置、后置通配都只在段内生效
        let leading = PointcutExpression::parse("execution(* billing.*Service.m(..))").unwrap();
        assert!(leading.matches(&sig("void", "billing.InvoiceService", "m", &[])));
        assert!(leading.matches(&sig("void", "billing.Service", "m", &[])));
        assert!(!leading.matches(&sig("void", "billing.InvoiceRepo", "m", &[])));

        let inner = PointcutExpression::parse("execution(* billing.In*Service.m(..))").unwrap();
        assert!(inner.matches(&sig("void", "billing.InvoiceService", "m", &[])));
        assert!(!inner.matches(&sig("void", "billing.TaxService", "m", &[])));

        let trailing = PointcutExpression::parse("execution(* billing.Invoice*.m(..))").unwrap();
        assert!(trailing.matches(&sig("void", "billing.InvoiceService", "m", &[])));
        assert!(trailing.matches(&sig("void", "billing.Invoice", "m", &[])));
        assert!(!trailing.matches(&sig("void", "billing.TaxService", "m", &[])));
    }

    #[test]
    fn test_nested_scope() {
        let pc = PointcutExpression::parse("execution(* billing..*(..))").unwrap();

        assert!(pc.matches(&sig("i64", "billing", "total", &[])));
        assert!(pc.matches(&sig("i64", "billing.InvoiceService", "total", &[])));
        assert!(pc.matches(&sig("i64", "billing.core.deep.Service", "total", &[])));
        assert!(!pc.matches(&sig("i64", "sales.InvoiceService", "total", &[])));

        // 带显式分隔点的写法等价
        let dotted = PointcutExpression::parse("execution(* billing...total(..))").unwrap();
        assert!(dotted.matches(&sig("i64", "billing.core.Service", "total", &[])));
        assert!(!dotted.matches(&sig("i64", "sales.Service", "total", &[])));
    }

    #[test]
    fn test_nested_scope_under_type() {
        let pc = PointcutExpression::parse("execution(* billing.InvoiceService..*(..))").unwrap();

        assert!(pc.matches(&sig("i64", "billing.InvoiceService", "total", &[])));
        assert!(pc.matches(&sig("i64", "billing.InvoiceService.Inner", "total", &[])));
        assert!(!pc.matches(&sig("i64", "billing.TaxService", "total", &[])));
    }

    #[test]
    fn test_empty_params_is_exact_zero_arity() {
        let pc = PointcutExpression::parse("execution(void a.B.ping())").unwrap();

        assert!(pc.matches(&sig("void", "a.B", "ping", &[])));
        assert!(!pc.matches(&sig("void", "a.B", "ping", &["i64"])));
    }

    #[test]
    fn test_throws_pattern() {
        let pc = PointcutExpression::parse("execution(* a.B.m(..) throws Timeout*)").unwrap();

        let matching =
            sig("void", "a.B", "m", &[]).with_error_types(["TimeoutError"]);
        let other = sig("void", "a.B", "m", &[]).with_error_types(["IoError"]);
        let none = sig("void", "a.B", "m", &[]);

        assert!(pc.matches(&matching));
        assert!(!pc.matches(&other));
        assert!(!pc.matches(&none));
    }

    #[test]
    fn test_modifiers_accepted_and_ignored() {
        let pc = PointcutExpression::parse("execution(public * a.B.m(..))").unwrap();
        assert!(pc.matches(&sig("void", "a.B", "m", &[])));
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            "within(* a.B.m(..))",               // 不支持的 kind
            "execution",                         // 缺 '('
            "execution()",                       // 空表达式体
            "execution(* m(..))",                // 缺声明类型
            "execution(* a.B.(..))",             // 缺方法名
            "execution(* a..b.B.m(..))",         // '..' 位置非法
            "execution(* a.B.m(i64, ..))",       // '..' 不是唯一参数模式
            "execution(* a.B.m(i64,))",          // 空参数模式
            "execution(bogus * a.B.m(..))",      // 未知修饰符
            "execution(* a.B.m(..) oops)",       // 多余尾部
            "execution(* a.B.m(..) throws)",     // throws 后缺模式
            "execution(* a.B#bad.m(..))",        // 非法字符
        ];
        for case in cases {
            let result = PointcutExpression::parse(case);
            assert!(
                matches!(result, Err(WeaveError::PointcutParse { .. })),
                "expected parse error for '{}'",
                case
            );
        }
    }

    #[test]
    fn test_matching_is_pure_and_reparse_equivalent() {
        let text = "execution(* billing..get*(i64, *))";
        let first = PointcutExpression::parse(text).unwrap();
        let second = PointcutExpression::parse(text).unwrap();

        let samples = [
            sig("User", "billing.InvoiceService", "get_user", &["i64", "str"]),
            sig("User", "billing", "get", &["i64", "i64"]),
            sig("User", "billing.a.b.c", "get_all", &["i64", "void"]),
            sig("User", "sales.InvoiceService", "get_user", &["i64", "str"]),
            sig("User", "billing.InvoiceService", "get_user", &["i64"]),
            sig("User", "billing.InvoiceService", "set_user", &["i64", "str"]),
        ];
        for sample in &samples {
            let once = first.matches(sample);
            let twice = first.matches(sample);
            assert_eq!(once, twice, "matching must be deterministic for {}", sample);
            assert_eq!(
                once,
                second.matches(sample),
                "re-parsed expression must agree for {}",
                sample
            );
        }
    }

    #[test]
    fn test_combinators() {
        let services = Pointcut::parse("execution(* billing..*(..))").unwrap();
        let getters = Pointcut::parse("execution(* *.*.get*(..))").unwrap();

        let both = services.clone().and(getters.clone());
        assert!(both.matches(&sig("User", "billing.InvoiceService", "get_user", &[])));
        assert!(!both.matches(&sig("void", "billing.InvoiceService", "save", &[])));

        let either = services.clone().or(getters);
        assert!(either.matches(&sig("void", "billing.InvoiceService", "save", &[])));
        assert!(either.matches(&sig("User", "sales.UserService", "get_user", &[])));

        let excluded = services.not();
        assert!(excluded.matches(&sig("void", "sales.UserService", "save", &[])));
        assert!(!excluded.matches(&sig("void", "billing.InvoiceService", "save", &[])));
    }
}
