use super::{
    handlers::{self, auth, health, notes, photos},
    storage,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::verify::verify_pin,
        photos::list_photos,
        photos::get_photo,
        photos::upload_photo,
        photos::delete_photo,
        notes::list_notes,
        notes::get_note,
        notes::create_note,
        notes::update_note,
        notes::delete_note,
    ),
    components(schemas(
        health::Health,
        handlers::ErrorMessage,
        auth::types::VerifyRequest,
        auth::types::VerifyResponse,
        photos::UploadPhotoForm,
        storage::Photo,
        storage::Note,
        storage::NewNote,
        storage::NotePatch,
    )),
    modifiers(&PinHeader),
    tags(
        (name = "health", description = "Liveness and database status"),
        (name = "auth", description = "PIN verification"),
        (name = "photos", description = "Shared photos"),
        (name = "notes", description = "Shared notes"),
    )
)]
struct ApiDoc;

// The PIN travels raw in the Authorization header, no scheme prefix.
struct PinHeader;

impl Modify for PinHeader {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "pin",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("authorization"))),
        );
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
