mod align_tests;
mod ld_tests;
mod parse_tests;
