//! Luhn (mod 10) check digits for card numbers.

use rand::Rng;

/// Length of issued card numbers.
pub const CARD_NUMBER_LENGTH: usize = 16;

/// Generate a random number of `length` digits whose last digit is the Luhn check digit.
///
/// # Panics
///
/// Panics if `length` is zero.
pub fn generate(length: usize) -> String {
    assert!(length > 0, "card number length must be positive");

    let mut rng = rand::rng();
    let mut digits: Vec<u8> = (0..length - 1).map(|_| rng.random_range(0..10)).collect();
    digits.push(check_digit(&digits));

    digits.into_iter().map(|d| char::from(b'0' + d)).collect()
}

/// Digit that makes `payload` followed by it pass the checksum.
///
/// Walking from the right, every other digit starting with the rightmost
/// payload digit is doubled (minus 9 when it exceeds 9).
pub fn check_digit(payload: &[u8]) -> u8 {
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let d = u32::from(d);
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    ((10 - sum % 10) % 10) as u8
}

/// Whether `number` is all ASCII digits and passes the mod 10 checksum.
pub fn is_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u8> = number.bytes().map(|b| b - b'0').collect();
    let (payload, last) = digits.split_at(digits.len() - 1);
    check_digit(payload) == last[0]
}
