//! # eac3-core
//!
//! E-AC-3 解码核心基础设施: 比特流读取/写入与统一错误类型.

pub mod bitreader;
pub mod bitwriter;
pub mod error;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{Eac3Error, Eac3Result};
