// Module declarations
pub mod align;
pub mod assoc;
pub mod freq;
pub mod genotype;
pub mod ld;
pub mod output;
pub mod parse;
pub mod process;
pub mod progress;
pub mod qc;
pub mod regression;
pub mod tophits;

#[cfg(test)]
mod tests;
