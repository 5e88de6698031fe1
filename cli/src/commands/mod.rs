pub mod address;
pub mod balance;
pub mod deposit;
pub mod derive;
pub mod info;
pub mod serve;
pub mod withdraw;
