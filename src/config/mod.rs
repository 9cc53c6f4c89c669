// UART 驱动编译期配置
pub const NUM_UARTS: usize = 2; // SoC 上的 UART 数量
pub const FIFO_DEPTH: usize = 16;
pub const FIFO_HALF_DEPTH: usize = FIFO_DEPTH / 2;
pub const DMA_MAX_TRANSFER: usize = 4096; // 单次 DMA 传输上限 4KB
pub const NUM_DMA_CHANNELS: usize = 8;
pub const DLF_BITS: u32 = 4; // 小数分频寄存器宽度
