//! 日志模块，支持在不同环境下的日志打印
//! - QEMU环境：使用cortex-m-semihosting的hprint
//! - 测试环境：使用标准库的print
//! - 其他环境：丢弃输出
//!
//! 驱动在中断上下文中也会打日志（trace 级别），默认级别为 Info，
//! 因此中断路径上的日志默认不产生任何输出。

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicUsize, Ordering};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(usize)]
pub enum LogLevel {
    /// 错误级别
    Error = 0,
    /// 警告级别
    Warn = 1,
    /// 信息级别
    Info = 2,
    /// 调试级别
    Debug = 3,
    /// 跟踪级别
    Trace = 4,
}

impl LogLevel {
    const fn from_usize(value: usize) -> Self {
        match value {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// 记录前缀
    pub const fn tag(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

/// 全局日志级别，默认为Info
static GLOBAL_LOG_LEVEL: AtomicUsize = AtomicUsize::new(LogLevel::Info as usize);

/// 设置全局日志级别
pub fn set_log_level(level: LogLevel) {
    GLOBAL_LOG_LEVEL.store(level as usize, Ordering::Relaxed);
}

/// 获取全局日志级别
pub fn get_log_level() -> LogLevel {
    LogLevel::from_usize(GLOBAL_LOG_LEVEL.load(Ordering::Relaxed))
}

/// QEMU环境下打印日志
#[cfg(all(feature = "cortex_m3", not(test)))]
#[inline(always)]
pub fn log_write(s: &str) -> fmt::Result {
    cortex_m_semihosting::hprint!("{}", s);
    Ok(())
}

/// 测试环境及其他环境下打印日志
#[cfg(any(test, not(feature = "cortex_m3")))]
#[inline(always)]
pub fn log_write(_s: &str) -> fmt::Result {
    #[cfg(test)]
    std::print!("{}", _s);
    Ok(())
}

/// 输出一条完整的日志记录
///
/// 级别只检查一次，前缀、正文和换行写入同一个 [`LogWriter`]。
#[macro_export]
macro_rules! log {
    ($level:expr, $($arg:tt)*) => {{
        let level: $crate::log::LogLevel = $level;
        if $crate::log::enabled(level) {
            use core::fmt::Write;
            let mut writer = $crate::log::LogWriter;
            let _ = write!(writer, "[{}] ", level.tag());
            let _ = write!(writer, $($arg)*);
            let _ = writer.write_str("\n");
        }
    }};
}

/// 当前级别下是否输出
#[inline(always)]
pub fn enabled(level: LogLevel) -> bool {
    level <= get_log_level()
}

/// 日志写入器
pub struct LogWriter;

impl Write for LogWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        log_write(s)
    }
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { $crate::log!($crate::log::LogLevel::Error, $($arg)*) };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::log!($crate::log::LogLevel::Warn, $($arg)*) };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { $crate::log!($crate::log::LogLevel::Info, $($arg)*) };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::log!($crate::log::LogLevel::Debug, $($arg)*) };
}

/// 中断路径上使用
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::log!($crate::log::LogLevel::Trace, $($arg)*) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_log_level_setting() {
        set_log_level(LogLevel::Debug);
        assert_eq!(get_log_level(), LogLevel::Debug);

        set_log_level(LogLevel::Error);
        assert_eq!(get_log_level(), LogLevel::Error);

        // 恢复默认级别
        set_log_level(LogLevel::Info);
        assert_eq!(get_log_level(), LogLevel::Info);
    }

    #[test]
    fn test_log_writer() {
        let mut writer = LogWriter;
        let result = writer.write_str("uart0: 测试日志");
        assert!(result.is_ok());
    }

    #[test]
    #[serial]
    fn test_enabled_follows_level() {
        set_log_level(LogLevel::Warn);
        assert!(enabled(LogLevel::Error));
        assert!(enabled(LogLevel::Warn));
        assert!(!enabled(LogLevel::Info));
        assert!(!enabled(LogLevel::Trace));
        set_log_level(LogLevel::Info);
    }

    #[test]
    fn test_tags() {
        assert_eq!(LogLevel::Warn.tag(), "WARN");
        assert_eq!(LogLevel::Trace.tag(), "TRACE");
    }

    #[test]
    #[serial]
    fn test_log_macros_in_expression_position() {
        // 宏展开为块表达式，可以直接用在 match 分支里
        let result: core::result::Result<(), ()> = Err(());
        match result {
            Ok(()) => info!("never"),
            Err(()) => warn!("uart{}: line error", 0),
        }
        error!("错误 {}", -5);
        debug!("调试");
        trace!("跟踪");
    }
}
