mod helpers;
mod mocks;

mod callbacks;
mod checkout;
mod scans;
