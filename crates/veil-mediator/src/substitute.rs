//! Safe substitutes for blocked capabilities
//!
//! Neutral capabilities get an empty value of the shape the caller expects.
//! Fingerprinting surfaces get fresh noise on every call so repeated reads
//! cannot be correlated. Peer connections and workers have no plausible
//! empty value and are refused outright.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use uuid::Uuid;
use veil_consent::PermissionKey;

use crate::endpoint::{Access, Invocation};

const DATA_URL_PREFIX: &str = "data:image/png;base64,";
const DATA_URL_NOISE_LEN: usize = 50;
const TOKEN_LEN: usize = 16;
const DEVICE_MEMORY_CHOICES: [u64; 3] = [2, 4, 8];
const SCREEN_SIZES: [(u64, u64); 3] = [(1920, 1080), (1366, 768), (1280, 720)];
const COLOR_DEPTHS: [u64; 2] = [24, 30];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Substitute {
    Value(Value),
    Refuse,
}

pub(crate) fn substitute_for(
    capability: &str,
    key: PermissionKey,
    invocation: &Invocation,
) -> Substitute {
    match key {
        PermissionKey::WebRtc | PermissionKey::ServiceWorker => Substitute::Refuse,
        _ if invocation.is_write() => Substitute::Value(Value::Null),
        PermissionKey::Fingerprinting => Substitute::Value(noise(capability)),
        _ => Substitute::Value(neutral(capability, key, &invocation.access)),
    }
}

fn neutral(capability: &str, key: PermissionKey, access: &Access) -> Value {
    match capability {
        "document.cookie" => json!(""),
        "localStorage" | "sessionStorage" => json!({}),
        "indexedDB" => Value::Null,
        "navigator.plugins" => json!([]),
        _ if capability.ends_with(".length") => json!(0),
        _ => match (key, access) {
            (PermissionKey::Cookies, Access::Read) => json!(""),
            (PermissionKey::Plugins, Access::Read) => json!([]),
            _ => Value::Null,
        },
    }
}

fn noise(capability: &str) -> Value {
    let bytes = random_bytes(64);
    let pick = bytes[0] as usize;

    match capability {
        "canvas.toDataURL" => {
            let encoded = STANDARD.encode(&bytes);
            json!(format!("{}{}", DATA_URL_PREFIX, &encoded[..DATA_URL_NOISE_LEN]))
        }
        "canvas.getImageData" => json!(bytes[1..5].to_vec()),
        "navigator.hardwareConcurrency" => json!(1 + pick % 4),
        "navigator.deviceMemory" => {
            json!(DEVICE_MEMORY_CHOICES[pick % DEVICE_MEMORY_CHOICES.len()])
        }
        "screen" => {
            let (width, height) = SCREEN_SIZES[pick % SCREEN_SIZES.len()];
            let depth = COLOR_DEPTHS[bytes[1] as usize % COLOR_DEPTHS.len()];
            json!({
                "width": width,
                "height": height,
                "availWidth": width,
                "availHeight": height.saturating_sub(40),
                "colorDepth": depth,
                "pixelDepth": depth,
            })
        }
        "screen.colorDepth" => json!(COLOR_DEPTHS[pick % COLOR_DEPTHS.len()]),
        _ => json!(random_token()),
    }
}

fn random_token() -> String {
    let encoded = STANDARD.encode(random_bytes(TOKEN_LEN * 2));
    encoded
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(TOKEN_LEN)
        .collect()
}

/// Random bytes drawn from v4 UUIDs. Bytes 6 and 8 of each UUID carry fixed
/// version bits, which is irrelevant for noise.
fn random_bytes(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len + 16);
    while out.len() < len {
        out.extend_from_slice(Uuid::new_v4().as_bytes());
    }
    out.truncate(len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked_read(capability: &str, key: PermissionKey) -> Value {
        match substitute_for(capability, key, &Invocation::read()) {
            Substitute::Value(value) => value,
            Substitute::Refuse => panic!("{} should have a substitute", capability),
        }
    }

    #[test]
    fn test_neutral_substitutes() {
        assert_eq!(blocked_read("document.cookie", PermissionKey::Cookies), json!(""));
        assert_eq!(blocked_read("localStorage", PermissionKey::LocalStorage), json!({}));
        assert_eq!(blocked_read("sessionStorage", PermissionKey::LocalStorage), json!({}));
        assert_eq!(blocked_read("indexedDB", PermissionKey::IndexedDb), Value::Null);
        assert_eq!(blocked_read("navigator.plugins", PermissionKey::Plugins), json!([]));
        assert_eq!(blocked_read("localStorage.length", PermissionKey::LocalStorage), json!(0));

        let item = substitute_for(
            "localStorage.getItem",
            PermissionKey::LocalStorage,
            &Invocation::call(vec![json!("token")]),
        );
        assert_eq!(item, Substitute::Value(Value::Null));
    }

    #[test]
    fn test_data_url_noise() {
        let first = blocked_read("canvas.toDataURL", PermissionKey::Fingerprinting);
        let second = blocked_read("canvas.toDataURL", PermissionKey::Fingerprinting);

        let first = first.as_str().unwrap().to_string();
        assert!(first.starts_with(DATA_URL_PREFIX));
        assert_eq!(first.len(), DATA_URL_PREFIX.len() + DATA_URL_NOISE_LEN);
        assert_ne!(Value::String(first), second);
    }

    #[test]
    fn test_bounded_noise() {
        for _ in 0..32 {
            let cores = blocked_read(
                "navigator.hardwareConcurrency",
                PermissionKey::Fingerprinting,
            );
            let cores = cores.as_u64().unwrap();
            assert!((1..=4).contains(&cores));

            let memory = blocked_read("navigator.deviceMemory", PermissionKey::Fingerprinting);
            assert!(DEVICE_MEMORY_CHOICES.contains(&memory.as_u64().unwrap()));

            let pixels = blocked_read("canvas.getImageData", PermissionKey::Fingerprinting);
            assert_eq!(pixels.as_array().unwrap().len(), 4);
        }

        let screen = blocked_read("screen", PermissionKey::Fingerprinting);
        let width = screen["width"].as_u64().unwrap();
        assert!(SCREEN_SIZES.iter().any(|(w, _)| *w == width));

        let token = blocked_read("canvas.measureText", PermissionKey::Fingerprinting);
        assert_eq!(token.as_str().unwrap().len(), TOKEN_LEN);
    }

    #[test]
    fn test_error_class_is_refused() {
        let invocation = Invocation::call(vec![]);
        assert_eq!(
            substitute_for("RTCPeerConnection", PermissionKey::WebRtc, &invocation),
            Substitute::Refuse
        );
        assert_eq!(
            substitute_for("ServiceWorker", PermissionKey::ServiceWorker, &invocation),
            Substitute::Refuse
        );
    }

    #[test]
    fn test_blocked_writes_return_null() {
        let write = Invocation::write(json!("id=1"));
        assert_eq!(
            substitute_for("document.cookie", PermissionKey::Cookies, &write),
            Substitute::Value(Value::Null)
        );
        assert_eq!(
            substitute_for("RTCPeerConnection", PermissionKey::WebRtc, &write),
            Substitute::Refuse
        );
    }
}
