//! Identifier generation.
//!
//! Poll ids double as human-typeable join codes, so they use a short
//! uppercase alphabet. Nomination and participant ids only need to be
//! unique within one process lifetime.

use rand::distributions::Alphanumeric;
use rand::Rng;

const POLL_ID_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const POLL_ID_LEN: usize = 6;
const NOMINATION_ID_LEN: usize = 8;
const PARTICIPANT_ID_LEN: usize = 21;

/// Six-character uppercase join code.
pub fn create_poll_id() -> String {
    let mut rng = rand::thread_rng();
    (0..POLL_ID_LEN)
        .map(|_| POLL_ID_ALPHABET[rng.gen_range(0..POLL_ID_ALPHABET.len())] as char)
        .collect()
}

/// Eight-character alphanumeric nomination id.
pub fn create_nomination_id() -> String {
    random_alphanumeric(NOMINATION_ID_LEN)
}

/// Participant identity minted at the poll-creation boundary.
pub fn create_participant_id() -> String {
    random_alphanumeric(PARTICIPANT_ID_LEN)
}

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
