pub mod publish;
pub mod sync;
pub mod worker;
