//! Opaque identifier generation for sessions and files.

use nanoid::nanoid;

const ALPHABET: [char; 64] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L',
    'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4',
    '5', '6', '7', '8', '9', '_', '-',
];

const ID_LEN: usize = 21;

/// Produce a 21-character id from `[A-Za-z0-9_-]`, matching `^[A-Za-z0-9_-]{21}$`.
pub fn new_id() -> String {
    nanoid!(ID_LEN, &ALPHABET)
}
