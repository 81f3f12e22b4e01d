use super::OperatorKind;

/// Escape `\`, `%` and `_` so the operand matches literally inside LIKE.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// LIKE pattern for a text-match operator, `None` for other operators.
///
/// # Examples
/// ```
/// use domainql::operator::{escape::like_pattern, OperatorKind};
/// assert_eq!(like_pattern(OperatorKind::Contain, "50%").as_deref(), Some("%50\\%%"));
/// assert_eq!(like_pattern(OperatorKind::Start, "adm").as_deref(), Some("adm%"));
/// ```
pub fn like_pattern(operator: OperatorKind, value: &str) -> Option<String> {
    let escaped = escape_like(value);
    match operator {
        OperatorKind::Contain | OperatorKind::NotContain => Some(format!("%{}%", escaped)),
        OperatorKind::Start | OperatorKind::NotStart => Some(format!("{}%", escaped)),
        OperatorKind::End | OperatorKind::NotEnd => Some(format!("%{}", escaped)),
        _ => None,
    }
}

/// Escape regular-expression metacharacters so the operand matches literally.
pub fn escape_regex(value: &str) -> String {
    regex::escape(value)
}

/// Anchored regex for a text-match operator; `RegexMatch` operands pass through verbatim.
pub fn regex_pattern(operator: OperatorKind, value: &str) -> Option<String> {
    match operator {
        OperatorKind::RegexMatch => Some(value.to_string()),
        OperatorKind::Contain | OperatorKind::NotContain => Some(escape_regex(value)),
        OperatorKind::Start | OperatorKind::NotStart => Some(format!("^{}", escape_regex(value))),
        OperatorKind::End | OperatorKind::NotEnd => Some(format!("{}$", escape_regex(value))),
        _ => None,
    }
}
