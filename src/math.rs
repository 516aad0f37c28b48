pub mod bbs;
pub mod modular;
pub mod primality;
pub mod random;

pub use bbs::BlumBlumShub;
pub use modular::{are_relatively_prime, extended_gcd, gcd, mod_inverse, mod_pow};
pub use primality::{is_prime, miller_rabin_test, PrimeSource, MILLER_RABIN_ROUNDS};
pub use random::{random_candidate, random_in_range, Bootstrap};
