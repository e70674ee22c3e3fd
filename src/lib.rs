#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
pub mod families;
pub mod io;
pub mod lineage;
pub mod monte;
pub mod outlier;
pub mod pedigree;
pub mod rank;
pub mod shuffle;
pub mod tdt;
pub mod types;
