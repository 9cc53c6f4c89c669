/// POSIX errno 数值
mod errno {
    pub const EPERM: i32 = 1;
    pub const EIO: i32 = 5;
    pub const EAGAIN: i32 = 11;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
    pub const ECANCELED: i32 = 125;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    // 参数相关
    InvalidArgument,

    // 资源相关
    Busy,
    WouldBlock,
    InvalidState,

    // 传输结果
    LineError,
    Cancelled,
}

impl UartError {
    /// 负的 errno 错误码，供 C 风格调用方使用
    pub const fn errno(self) -> i32 {
        let code = match self {
            UartError::InvalidArgument => errno::EINVAL,
            UartError::Busy => errno::EBUSY,
            UartError::WouldBlock => errno::EAGAIN,
            UartError::InvalidState => errno::EPERM,
            UartError::LineError => errno::EIO,
            UartError::Cancelled => errno::ECANCELED,
        };
        -code
    }
}

impl core::fmt::Display for UartError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UartError::InvalidArgument => write!(f, "Invalid argument"),

            UartError::Busy => write!(f, "Transfer already in progress"),
            UartError::WouldBlock => write!(f, "Operation would block"),
            UartError::InvalidState => write!(f, "Invalid driver state"),

            UartError::LineError => write!(f, "Receiver line error"),
            UartError::Cancelled => write!(f, "Transfer cancelled"),
        }
    }
}

pub type Result<T> = core::result::Result<T, UartError>;
