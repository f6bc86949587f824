pub mod conj;
pub mod slice;
pub mod stack;
