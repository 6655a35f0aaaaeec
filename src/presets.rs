//! Conversion presets.
//!
//! A preset is a named target format plus a full set of conversion options.
//! Four system presets ship built in; user presets come from `pixo.toml`
//! (`[[presets]]`) and are listed after them.

use crate::bridge::ConversionOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preset {
    pub id: String,
    pub name: String,
    /// Input format this preset is meant for, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Target format token.
    pub to: String,
    #[serde(default)]
    pub options: ConversionOptions,
    /// Built in, not user defined.
    #[serde(skip)]
    pub system: bool,
}

fn system(
    id: &str,
    name: &str,
    from: Option<&str>,
    to: &str,
    options: ConversionOptions,
) -> Preset {
    Preset {
        id: id.to_string(),
        name: name.to_string(),
        from: from.map(str::to_string),
        to: to.to_string(),
        options,
        system: true,
    }
}

/// The presets every installation has.
pub fn builtin_presets() -> Vec<Preset> {
    vec![
        system(
            "heic-to-jpg",
            "HEIC to JPG",
            Some("heic"),
            "jpg",
            ConversionOptions {
                progressive: true,
                ..ConversionOptions::with_quality(85.0)
            },
        ),
        system(
            "png-to-webp",
            "PNG to WebP",
            Some("png"),
            "webp",
            ConversionOptions {
                preserve_metadata: false,
                ..ConversionOptions::with_quality(82.0)
            },
        ),
        system(
            "social-jpg",
            "Social JPG",
            None,
            "jpg",
            ConversionOptions {
                preserve_metadata: false,
                progressive: true,
                max_dimension: Some(2048.0),
                ..ConversionOptions::with_quality(80.0)
            },
        ),
        system(
            "print-png",
            "Print PNG",
            None,
            "png",
            ConversionOptions {
                compression_level: Some(4),
                ..ConversionOptions::with_quality(100.0)
            },
        ),
    ]
}

/// Built-in presets followed by the user's.
pub fn all_presets(user: &[Preset]) -> Vec<Preset> {
    let mut presets = builtin_presets();
    presets.extend(user.iter().cloned());
    presets
}

pub fn find_preset<'a>(presets: &'a [Preset], id: &str) -> Option<&'a Preset> {
    presets.iter().find(|preset| preset.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::TargetFormat;

    #[test]
    fn builtins_target_valid_formats() {
        for preset in builtin_presets() {
            assert!(preset.system);
            assert!(TargetFormat::parse(&preset.to).is_some(), "{}", preset.id);
        }
    }

    #[test]
    fn social_preset_bounds_size() {
        let presets = builtin_presets();
        let social = find_preset(&presets, "social-jpg").unwrap();
        let plan = social.options.normalize();
        assert_eq!(plan.quality.value(), 0.8);
        assert!(!plan.preserve_metadata);
        assert!(plan.progressive);
        assert_eq!(
            plan.resize,
            crate::bridge::ResizePolicy::Fit { max: 2048.0 }
        );
    }

    #[test]
    fn heic_preset_keeps_metadata() {
        let presets = builtin_presets();
        let heic = find_preset(&presets, "heic-to-jpg").unwrap();
        assert_eq!(heic.from.as_deref(), Some("heic"));
        assert!(heic.options.preserve_metadata);
        assert_eq!(heic.options.normalize().quality.value(), 0.85);
    }

    #[test]
    fn user_presets_follow_builtins() {
        let user: Preset = toml::from_str(
            r#"
id = "thumbs"
name = "Thumbnails"
to = "webp"

[options]
quality = 60
maxDimension = 256
"#,
        )
        .unwrap();
        assert!(!user.system);

        let presets = all_presets(std::slice::from_ref(&user));
        assert_eq!(presets.len(), 5);
        assert_eq!(presets.last().unwrap().id, "thumbs");
        assert_eq!(
            find_preset(&presets, "thumbs").unwrap().options.max_dimension,
            Some(256.0)
        );
        assert!(find_preset(&presets, "missing").is_none());
    }

    #[test]
    fn unknown_option_keys_are_rejected() {
        let result: Result<Preset, _> = toml::from_str(
            r#"
id = "x"
name = "X"
to = "png"

[options]
qualty = 60
"#,
        );
        assert!(result.is_err());
    }
}
