//! 轮询传输
//!
//! 不保存任何状态。阻塞版本没有超时，硬件卡死时会一直等待。
//!
//! `set_config` 总是打开 PTIME，此时 LSR.THRE 表示 TX FIFO 满。

use crate::error::{Result, UartError};
use crate::hal::{DmaController, Registers};
use crate::uart::regs::{Lsr, Reg, Usr};
use crate::uart::{StatusFlags, UartDriver, UartId};

impl<R: Registers, D: DmaController> UartDriver<R, D> {
    /// 阻塞写一个字节，等待 TX FIFO 有空位
    pub fn write(&self, id: UartId, byte: u8) -> Result<()> {
        let regs = self.registers(id);
        while Lsr::from_bits_retain(regs.read(Reg::Lsr)).contains(Lsr::THRE) {
            core::hint::spin_loop();
        }
        regs.write(Reg::RbrThrDll, byte as u32);
        Ok(())
    }

    /// 阻塞读一个字节
    ///
    /// 返回的状态只含等待期间看到的线路错误，错误通过状态报告而不是 `Err`。
    pub fn read(&self, id: UartId) -> Result<(u8, StatusFlags)> {
        let regs = self.registers(id);
        let mut errors = StatusFlags::empty();
        loop {
            let lsr = Lsr::from_bits_retain(regs.read(Reg::Lsr));
            // 读 LSR 清除错误位，等待期间的错误要累积
            errors |= StatusFlags::from_lsr(lsr);
            if lsr.contains(Lsr::DR) {
                break;
            }
            core::hint::spin_loop();
        }
        let byte = regs.read(Reg::RbrThrDll) as u8;
        if errors.has_line_error() {
            crate::warn!("{}: line error {:?}", id.name(), errors);
        }
        Ok((byte, errors))
    }

    /// 非阻塞写，TX FIFO 满时返回 `WouldBlock`
    pub fn write_non_block(&self, id: UartId, byte: u8) -> Result<()> {
        let regs = self.registers(id);
        if !Usr::from_bits_retain(regs.read(Reg::Usr)).contains(Usr::TFNF) {
            return Err(UartError::WouldBlock);
        }
        regs.write(Reg::RbrThrDll, byte as u32);
        Ok(())
    }

    /// 非阻塞读，没有数据时返回 `WouldBlock`
    pub fn read_non_block(&self, id: UartId) -> Result<u8> {
        let regs = self.registers(id);
        if !Lsr::from_bits_retain(regs.read(Reg::Lsr)).contains(Lsr::DR) {
            return Err(UartError::WouldBlock);
        }
        Ok(regs.read(Reg::RbrThrDll) as u8)
    }

    /// 阻塞写一段数据
    ///
    /// 最后一个字节进入 FIFO 就返回，不等待发送完成；需要时用 [`flush`](Self::flush)。
    pub fn write_buffer(&self, id: UartId, data: &[u8]) -> Result<()> {
        for &byte in data {
            self.write(id, byte)?;
        }
        Ok(())
    }

    /// 等待发送器完全空闲
    pub fn flush(&self, id: UartId) -> Result<()> {
        let regs = self.registers(id);
        while !Lsr::from_bits_retain(regs.read(Reg::Lsr)).contains(Lsr::TEMT) {
            core::hint::spin_loop();
        }
        Ok(())
    }
}
