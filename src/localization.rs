//! Message catalogue for the bot's Russian copy.
//!
//! The fluent resource is compiled into the binary so a misplaced working
//! directory can not silently blank out every reply.

use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use lazy_static::lazy_static;
use tracing::warn;
use unic_langid::LanguageIdentifier;

const RU_RESOURCE: &str = include_str!("../locales/ru/main.ftl");

lazy_static! {
    static ref BUNDLE: FluentBundle<FluentResource> = build_bundle();
}

fn build_bundle() -> FluentBundle<FluentResource> {
    let locale: LanguageIdentifier = "ru"
        .parse()
        .unwrap_or_else(|_| LanguageIdentifier::default());
    let mut bundle = FluentBundle::new_concurrent(vec![locale]);
    // Keep argument interpolation free of Unicode isolation marks; replies
    // go to a chat window, not to bidirectional layout.
    bundle.set_use_isolating(false);

    match FluentResource::try_new(RU_RESOURCE.to_string()) {
        Ok(resource) => {
            if bundle.add_resource(resource).is_err() {
                warn!("Some localization messages are overridden or invalid");
            }
        }
        Err((resource, errors)) => {
            warn!(?errors, "Localization resource has syntax errors");
            let _ = bundle.add_resource_overriding(resource);
        }
    }
    bundle
}

/// Look up a message by key.
pub fn t(key: &str) -> String {
    format_message(key, None)
}

/// Look up a message by key with arguments.
pub fn t_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut fluent_args = FluentArgs::new();
    for (name, value) in args {
        fluent_args.set(*name, FluentValue::from(*value));
    }
    format_message(key, Some(&fluent_args))
}

fn format_message(key: &str, args: Option<&FluentArgs>) -> String {
    let message = match BUNDLE.get_message(key) {
        Some(message) => message,
        None => {
            warn!(%key, "Missing localization key");
            return key.to_string();
        }
    };
    let pattern = match message.value() {
        Some(pattern) => pattern,
        None => {
            warn!(%key, "Localization key has no value");
            return key.to_string();
        }
    };

    let mut errors = Vec::new();
    let value = BUNDLE.format_pattern(pattern, args, &mut errors);
    if !errors.is_empty() {
        warn!(%key, ?errors, "Localization formatting errors");
    }
    value.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_resolve() {
        assert!(t("main-menu").contains("Главное меню"));
        assert!(t("unknown-input").contains("Помощь"));
    }

    #[test]
    fn missing_key_falls_back_to_key() {
        assert_eq!(t("no-such-key"), "no-such-key");
    }

    #[test]
    fn arguments_are_interpolated() {
        let text = t_args("university-saved", &[("slug", "togu")]);
        assert!(text.contains("togu"));
    }
}
