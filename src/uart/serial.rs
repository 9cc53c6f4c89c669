//! # 阻塞串口句柄
//!
//! [`SerialPort`] 把某个 UART 实例包装成 [`Device`]/[`Read`]/[`Write`]
//! 和 `core::fmt::Write`，底层使用轮询引擎。

use core::fmt;

use crate::drivers::{Device, Read, Write};
use crate::error::{Result, UartError};
use crate::hal::{DmaController, Registers};
use crate::uart::{UartConfig, UartDriver, UartId};

/// 单个 UART 实例的阻塞句柄
pub struct SerialPort<'a, R: Registers, D: DmaController> {
    driver: &'a UartDriver<R, D>,
    id: UartId,
    config: Option<UartConfig>,
}

impl<R: Registers, D: DmaController> UartDriver<R, D> {
    /// 获取实例的阻塞句柄
    pub fn serial(&self, id: UartId) -> SerialPort<'_, R, D> {
        SerialPort { driver: self, id, config: None }
    }
}

impl<'a, R: Registers, D: DmaController> SerialPort<'a, R, D> {
    /// `init` 时应用的配置
    pub fn with_config(mut self, config: UartConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn id(&self) -> UartId {
        self.id
    }
}

impl<R: Registers, D: DmaController> Device for SerialPort<'_, R, D> {
    type Error = UartError;

    /// 应用 `with_config` 给出的配置；没有给出时要求实例已经配置过
    fn init(&mut self) -> Result<()> {
        match self.config {
            Some(config) => self.driver.set_config(self.id, &config),
            None if self.is_ready() => Ok(()),
            None => Err(UartError::InvalidState),
        }
    }

    fn name(&self) -> &'static str {
        self.id.name()
    }

    fn is_ready(&self) -> bool {
        self.driver.get_config(self.id).is_some()
    }
}

impl<R: Registers, D: DmaController> Read for SerialPort<'_, R, D> {
    /// 阻塞读第一个字节，之后只取已经到达的数据
    ///
    /// 带线路错误的字节返回 `LineError`。
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some((first, rest)) = buf.split_first_mut() else {
            return Ok(0);
        };
        let (byte, status) = self.driver.read(self.id)?;
        if status.has_line_error() {
            return Err(UartError::LineError);
        }
        *first = byte;

        let mut count = 1;
        for slot in rest {
            match self.driver.read_non_block(self.id) {
                Ok(byte) => *slot = byte,
                Err(UartError::WouldBlock) => break,
                Err(err) => return Err(err),
            }
            count += 1;
        }
        Ok(count)
    }
}

impl<R: Registers, D: DmaController> Write for SerialPort<'_, R, D> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.driver.write_buffer(self.id, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.driver.flush(self.id)
    }
}

impl<R: Registers, D: DmaController> fmt::Write for SerialPort<'_, R, D> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.driver.write_buffer(self.id, s.as_bytes()).map_err(|_| fmt::Error)
    }
}

#[cfg(test)]
mod tests {
    use core::fmt::Write as _;

    use crate::drivers::mock::{MockDma, MockUart};
    use crate::drivers::{Device, Read, Write};
    use crate::error::UartError;
    use crate::uart::regs::Lsr;
    use crate::uart::{BaudDivisor, LineControl, UartConfig, UartDriver, UartId};

    fn driver() -> UartDriver<MockUart, MockDma> {
        UartDriver::new(MockUart::new(), MockUart::new(), MockDma::new())
    }

    fn config() -> UartConfig {
        UartConfig::new(LineControl::Lc8N1, BaudDivisor::pack(0, 208, 5))
    }

    #[test]
    fn test_init_and_name() {
        let driver = driver();
        let mut port = driver.serial(UartId::Uart1);
        assert!(!port.is_ready());
        assert_eq!(port.init(), Err(UartError::InvalidState));
        assert_eq!(port.name(), "UART1");

        let mut port = driver.serial(UartId::Uart1).with_config(config());
        port.init().unwrap();
        assert!(port.is_ready());
        assert_eq!(driver.serial(UartId::Uart1).init(), Ok(()));
    }

    #[test]
    fn test_write_all_and_fmt() {
        let driver = driver();
        let mut port = driver.serial(UartId::Uart0).with_config(config());
        port.init().unwrap();

        port.write_all(b"id=").unwrap();
        write!(port, "{}", 42).unwrap();
        port.flush().unwrap();

        let mut wire = [0u8; 16];
        let n = driver.registers(UartId::Uart0).take_transmitted_to(&mut wire);
        assert_eq!(&wire[..n], b"id=42");
    }

    #[test]
    fn test_read_available_bytes() {
        let driver = driver();
        let mut port = driver.serial(UartId::Uart0).with_config(config());
        port.init().unwrap();

        driver.registers(UartId::Uart0).receive(b"abc");
        let mut buf = [0u8; 8];
        assert_eq!(port.read(&mut buf), Ok(3));
        assert_eq!(&buf[..3], b"abc");

        driver.registers(UartId::Uart0).receive(b"z");
        assert_eq!(port.read_byte(), Ok(b'z'));
    }

    #[test]
    fn test_read_line_error() {
        let driver = driver();
        let mut port = driver.serial(UartId::Uart0).with_config(config());
        port.init().unwrap();

        let uart = driver.registers(UartId::Uart0);
        uart.receive(b"q");
        uart.inject_error(Lsr::FE);
        let mut buf = [0u8; 4];
        assert_eq!(port.read(&mut buf), Err(UartError::LineError));
    }
}
