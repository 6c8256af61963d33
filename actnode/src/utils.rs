mod priority_fifo;

pub use priority_fifo::PriorityFifo;
