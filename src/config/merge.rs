//! Shallow field-by-field merge for configuration records.
//!
//! A field from the overlay replaces the base value only when it is set,
//! i.e. not its type's zero value. Unset overlay fields never blank out a
//! base value. There is no recursion: the schema is flat.

use super::types::Config;

/// Zero-value test used to decide override precedence.
pub trait Unset {
    fn is_unset(&self) -> bool;
}

impl Unset for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl Unset for bool {
    fn is_unset(&self) -> bool {
        !*self
    }
}

impl Unset for u32 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

fn overlay_field<T: Unset + Clone>(base: &mut T, overlay: &T) {
    if !overlay.is_unset() {
        base.clone_from(overlay);
    }
}

impl Config {
    /// Merge `overlay` into `self`, last-non-empty-wins.
    ///
    /// `env_type` is not part of the merge; it is assigned at stage selection.
    pub fn merge_from(&mut self, overlay: &Config) {
        overlay_field(&mut self.log_level, &overlay.log_level);
        overlay_field(&mut self.addr, &overlay.addr);
        overlay_field(&mut self.track_xml, &overlay.track_xml);
        overlay_field(&mut self.sirena_client_id, &overlay.sirena_client_id);
        overlay_field(&mut self.sirena_host, &overlay.sirena_host);
        overlay_field(&mut self.sirena_port, &overlay.sirena_port);
        overlay_field(&mut self.client_public_key, &overlay.client_public_key);
        overlay_field(&mut self.client_private_key, &overlay.client_private_key);
        overlay_field(
            &mut self.client_private_key_password,
            &overlay.client_private_key_password,
        );
        overlay_field(&mut self.server_public_key, &overlay.server_public_key);
        overlay_field(&mut self.keys_dir, &overlay.keys_dir);
        overlay_field(&mut self.redis_host, &overlay.redis_host);
        overlay_field(&mut self.redis_port, &overlay.redis_port);
        overlay_field(&mut self.redis_password, &overlay.redis_password);
        overlay_field(&mut self.redis_db, &overlay.redis_db);
    }
}

/// Merge two records, with `overlay` taking precedence over `base`.
pub fn merge(mut base: Config, overlay: &Config) -> Config {
    base.merge_from(overlay);
    base
}

/// Merge records in order, with later records taking precedence.
pub fn merge_all<'a>(records: impl IntoIterator<Item = &'a Config>) -> Config {
    records
        .into_iter()
        .fold(Config::default(), |acc, record| merge(acc, record))
}
