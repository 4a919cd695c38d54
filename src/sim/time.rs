//! 仿真时间辅助函数
//!
//! 仿真时间是以时隙为步长推进的 `f64`。时隙边界按时隙大小自身的小数位数
//! 取整，避免累加误差让事件落入错误的时隙。

/// `slot_size` 十进制表示的小数位数，例如 `0.25 -> 2`，`10.0 -> 0`
pub fn decimals_of(slot_size: f64) -> u32 {
    let repr = format!("{slot_size}");
    match repr.split_once('.') {
        Some((_, frac)) => frac.trim_end_matches('0').len() as u32,
        None => 0,
    }
}

/// 四舍五入到 `decimals` 位小数
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}
