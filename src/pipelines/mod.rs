pub mod assembly_benchmark;
