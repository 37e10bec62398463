pub mod time;

/// # Summary
/// 规范化证券代码：去除首尾空白并转为大写。
///
/// # Arguments
/// * `raw`: 用户或配置输入的原始代码。
///
/// # Returns
/// 规范化后的代码，空串表示输入无效。
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}
