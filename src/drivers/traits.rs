//! # 字节流设备 Trait
//!
//! 面向上层代码的阻塞式字节流接口，与具体传输引擎无关。
//! [`SerialPort`](crate::uart::SerialPort) 用 UART 的轮询引擎实现它们。
//!
//! ```text
//! Device
//!    ├── Read
//!    └── Write
//!           └── ReadWrite = Read + Write
//! ```

/// 设备基础 trait
pub trait Device {
    type Error;

    /// 使设备进入可用状态
    fn init(&mut self) -> Result<(), Self::Error>;

    /// 用于日志的设备名
    fn name(&self) -> &'static str;

    /// 默认总是就绪
    fn is_ready(&self) -> bool {
        true
    }

    /// 默认重新 `init`
    fn reset(&mut self) -> Result<(), Self::Error> {
        self.init()
    }
}

/// 可读设备
pub trait Read: Device {
    /// 读到 `buf`，返回读取的字节数
    ///
    /// 至少等到一个字节可用。
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    /// 读满 `buf`
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.read(&mut buf[filled..])?;
        }
        Ok(())
    }
}

/// 可写设备
pub trait Write: Device {
    /// 写出 `buf` 的一部分或全部，返回写入的字节数
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;

    /// 等待已写入的数据全部发出
    fn flush(&mut self) -> Result<(), Self::Error>;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.write_all(&[byte])
    }

    /// 写出全部数据后 `flush`
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        let mut sent = 0;
        while sent < buf.len() {
            sent += self.write(&buf[sent..])?;
        }
        self.flush()
    }
}

/// 可读写设备
pub trait ReadWrite: Read + Write {}

impl<T: Read + Write> ReadWrite for T {}
