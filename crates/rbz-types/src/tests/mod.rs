mod sig_tests;
mod union_tests;
