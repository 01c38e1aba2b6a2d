/// Build the overlay address string for a public key.
///
/// The address is the hex-encoded key, prefixed by `identifier.` when an
/// identifier is given. One key can therefore back many client addresses.
pub fn make_address_string(public_key: &[u8], identifier: &str) -> String {
    let key = hex::encode(public_key);
    if identifier.is_empty() {
        key
    } else {
        format!("{identifier}.{key}")
    }
}
