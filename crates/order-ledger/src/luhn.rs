//! Luhn 校验
//!
//! 订单号在进入账本前必须通过 Luhn 校验。

/// 校验数字串是否满足 Luhn 算法
///
/// 空串或包含非 ASCII 数字的输入一律视为无效。
pub fn is_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    checksum(number.bytes().rev(), false) % 10 == 0
}

/// 计算应追加在 `prefix` 之后的校验位
///
/// 返回 None 表示前缀为空或含非数字字符。
pub fn check_digit(prefix: &str) -> Option<u8> {
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // 追加校验位后，prefix 的最低位处于需要加倍的位置
    let sum = checksum(prefix.bytes().rev(), true);
    Some(((10 - sum % 10) % 10) as u8)
}

/// 在 `prefix` 后追加校验位，得到一个合法订单号
pub fn complete(prefix: &str) -> Option<String> {
    check_digit(prefix).map(|d| format!("{prefix}{d}"))
}

fn checksum(digits_from_right: impl Iterator<Item = u8>, double_first: bool) -> u32 {
    digits_from_right
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            let doubled = (i % 2 == 0) == double_first;
            match (doubled, d * 2) {
                (true, v) if v > 9 => v - 9,
                (true, v) => v,
                (false, _) => d,
            }
        })
        .sum()
}
