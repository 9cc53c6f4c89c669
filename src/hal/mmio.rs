//! DesignWare APB UART 的 MMIO 寄存器块

use crate::hal::traits::Registers;
use crate::uart::regs::Reg;

crate::device_driver! {
    /// Synopsys DesignWare APB UART 寄存器块
    ///
    /// 所有寄存器均为 32 位宽，按 volatile 方式访问。
    name: DwApbUart,
    registers: {
        rbr_thr_dll: u32, 0x00;
        ier_dlh: u32, 0x04;
        iir_fcr: u32, 0x08;
        lcr: u32, 0x0C;
        mcr: u32, 0x10;
        lsr: u32, 0x14;
        msr: u32, 0x18;
        scr: u32, 0x1C;
        usr: u32, 0x7C;
        tfl: u32, 0x80;
        rfl: u32, 0x84;
        dlf: u32, 0xC0;
    }
}

impl Registers for DwApbUart {
    fn read(&self, reg: Reg) -> u32 {
        match reg {
            Reg::RbrThrDll => self.rbr_thr_dll(),
            Reg::IerDlh => self.ier_dlh(),
            Reg::IirFcr => self.iir_fcr(),
            Reg::Lcr => self.lcr(),
            Reg::Mcr => self.mcr(),
            Reg::Lsr => self.lsr(),
            Reg::Msr => self.msr(),
            Reg::Scr => self.scr(),
            Reg::Usr => self.usr(),
            Reg::Tfl => self.tfl(),
            Reg::Rfl => self.rfl(),
            Reg::Dlf => self.dlf(),
        }
    }

    fn write(&self, reg: Reg, value: u32) {
        match reg {
            Reg::RbrThrDll => self.rbr_thr_dll_write(value),
            Reg::IerDlh => self.ier_dlh_write(value),
            Reg::IirFcr => self.iir_fcr_write(value),
            Reg::Lcr => self.lcr_write(value),
            Reg::Mcr => self.mcr_write(value),
            Reg::Lsr => self.lsr_write(value),
            Reg::Msr => self.msr_write(value),
            Reg::Scr => self.scr_write(value),
            Reg::Usr => self.usr_write(value),
            Reg::Tfl => self.tfl_write(value),
            Reg::Rfl => self.rfl_write(value),
            Reg::Dlf => self.dlf_write(value),
        }
    }

    fn address_of(&self, reg: Reg) -> usize {
        self.base_addr() + reg.offset()
    }
}
