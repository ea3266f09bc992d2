use super::handlers::{auth, clients, health, notes, settings, users};
use utoipa::{
    Modify, OpenApi,
    openapi::{
        Contact, Info, InfoBuilder, License,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::login::login,
        auth::register::register,
        auth::verify::verify,
        users::list_users,
        users::create_user,
        users::update_user,
        users::update_user_status,
        users::delete_user,
        settings::get_profile,
        settings::update_profile,
        settings::change_password,
        settings::get_preferences,
        settings::update_preferences,
        settings::database_stats,
        clients::create_client,
        clients::list_clients,
        clients::get_client,
        clients::update_client,
        clients::delete_client,
        notes::create_note,
        notes::list_notes,
        notes::delete_note,
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "custodian", description = "Client record management API"),
        (name = "health", description = "Liveness and database reachability"),
        (name = "auth", description = "Login, self-registration and token verification"),
        (name = "users", description = "Account management (admin only)"),
        (name = "settings", description = "Profile, password, preferences and database statistics"),
        (name = "clients", description = "Client records with encrypted SSN"),
        (name = "notes", description = "Notes attached to client records"),
    )
)]
struct ApiDoc;

/// Registers the `bearer` scheme referenced by every protected path.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut openapi = ApiDoc::openapi();
    openapi.info = cargo_info();
    openapi
}

fn cargo_info() -> Info {
    // Use Cargo.toml metadata instead of the derive defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => {
            let name = name.trim();
            let email = email.trim_end_matches('>').trim();
            (
                (!name.is_empty()).then_some(name),
                (!email.is_empty()).then_some(email),
            )
        }
        None => {
            let name = author.trim();
            ((!name.is_empty()).then_some(name), None)
        }
    }
}
