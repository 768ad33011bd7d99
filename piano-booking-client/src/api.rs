//! Typed calls against the booking backend.

use piano_booking_http::{ApiRequest, ApiResponse, Transport};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::availability::{AvailabilityQuery, AvailabilityResponse};
use crate::confirmation::{BookingRequest, RoomQuery};
use crate::error::ClientError;
use crate::model::{PianoRoom, Profile};
use crate::role::UserRole;

pub const AVAILABILITY_SLOT_PATH: &str = "/api/piano-rooms/availabilitySlot";
pub const ROOM_AVAILABILITY_PATH: &str = "/api/piano-rooms/availability";
pub const MAKE_BOOKING_PATH: &str = "/api/studio-status/students/make-booking";

#[must_use]
pub fn profile_path(role: UserRole) -> String {
    format!("/api/{}/profile", role.api_segment())
}

#[derive(Deserialize, Default)]
struct StatusEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    let deserializer = &mut serde_json::Deserializer::from_slice(body);
    Ok(serde_path_to_error::deserialize(deserializer)?)
}

/// The backend wraps most payloads in `{"data": ...}` but not all of them.
fn parse_payload<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    let mut value: serde_json::Value = parse(body)?;
    let payload = match value.as_object_mut().and_then(|object| object.remove("data")) {
        Some(data) => data,
        None => value,
    };
    Ok(serde_path_to_error::deserialize(payload)?)
}

/// Turns a non-2xx response, or a 2xx one reporting `success: false`, into [`ClientError::Api`].
fn check_status(response: &ApiResponse) -> Result<(), ClientError> {
    let envelope: StatusEnvelope = serde_json::from_slice(&response.body).unwrap_or_default();
    if response.is_success() && envelope.success != Some(false) {
        return Ok(());
    }
    Err(ClientError::Api {
        status: response.status,
        message: envelope.message,
    })
}

pub struct BookingApi<T> {
    transport: T,
}

impl<T: Transport> BookingApi<T> {
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        token: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let mut request =
            ApiRequest::post_json(path, serde_json::to_vec(body)?).with_bearer_token(token);
        if let Some(key) = idempotency_key {
            request = request.with_idempotency_key(key);
        }
        let response = self.transport.send(request).await?;
        check_status(&response)?;
        Ok(response)
    }

    #[instrument(skip(self, token))]
    pub async fn availability_slots(
        &self,
        token: &str,
        query: &AvailabilityQuery,
    ) -> Result<AvailabilityResponse, ClientError> {
        let response = self.post(AVAILABILITY_SLOT_PATH, token, query, None).await?;
        parse_payload(&response.body)
    }

    #[instrument(skip(self, token))]
    pub async fn rooms(
        &self,
        token: &str,
        query: &RoomQuery,
    ) -> Result<Vec<PianoRoom>, ClientError> {
        let response = self.post(ROOM_AVAILABILITY_PATH, token, query, None).await?;
        let rooms = parse_payload::<Vec<PianoRoom>>(&response.body)?;
        debug!(count = rooms.len(), "candidate rooms");
        Ok(rooms)
    }

    #[instrument(skip(self, token, request))]
    pub async fn make_booking(
        &self,
        token: &str,
        idempotency_key: &str,
        request: &BookingRequest,
    ) -> Result<(), ClientError> {
        self.post(MAKE_BOOKING_PATH, token, request, Some(idempotency_key))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    pub async fn profile(&self, token: &str, role: UserRole) -> Result<Profile, ClientError> {
        let response = self
            .transport
            .send(ApiRequest::get(profile_path(role)).with_bearer_token(token))
            .await?;
        check_status(&response)?;
        parse_payload(&response.body)
    }
}

#[cfg(test)]
mod tests {
    use piano_booking_http::StatusCode;

    use super::*;
    use crate::testing::{MockReply, MockTransport};

    #[tokio::test]
    async fn rooms_accept_bare_and_wrapped_lists() {
        let transport = MockTransport::default();
        transport.reply(
            ROOM_AVAILABILITY_PATH,
            MockReply::ok(r#"[{"id":1,"name":"A","studios":[{"id":11}]}]"#),
        );
        transport.reply(
            ROOM_AVAILABILITY_PATH,
            MockReply::ok(r#"{"data":[{"id":2,"name":"B"}]}"#),
        );
        let api = BookingApi::new(transport);
        let query: RoomQuery = serde_json::from_value(serde_json::json!({
            "section": "section1", "district": "沙田", "date": "2024-05-01", "type": "上課"
        }))
        .unwrap();

        let bare = api.rooms("token", &query).await.unwrap();
        assert_eq!(bare[0].name, "A");
        let wrapped = api.rooms("token", &query).await.unwrap();
        assert_eq!(wrapped[0].name, "B");

        let sent = api.transport().requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].bearer_token.as_deref(), Some("token"));
        assert_eq!(sent[0].idempotency_key, None);
    }

    #[tokio::test]
    async fn failure_statuses_carry_the_server_message() {
        let transport = MockTransport::default();
        transport.reply(
            "/api/students/profile",
            MockReply::status(StatusCode::UNAUTHORIZED, r#"{"message":"token expired"}"#),
        );
        transport.reply(
            "/api/students/profile",
            MockReply::ok(r#"{"success":false,"message":"account pending approval"}"#),
        );
        let api = BookingApi::new(transport);

        let error = api.profile("t", UserRole::Student).await.unwrap_err();
        assert!(matches!(
            &error,
            ClientError::Api { status, .. } if *status == StatusCode::UNAUTHORIZED
        ));
        assert_eq!(error.user_message(), "token expired");

        let error = api.profile("t", UserRole::Student).await.unwrap_err();
        assert_eq!(error.user_message(), "account pending approval");
    }

    #[tokio::test]
    async fn unparsable_bodies_name_the_offending_path() {
        let transport = MockTransport::default();
        transport.reply(
            "/api/teachers/profile",
            MockReply::ok(r#"{"data":{"name":"Ms Chan","students":[{"id":1}]}}"#),
        );
        let api = BookingApi::new(transport);

        let error = api.profile("t", UserRole::Teacher).await.unwrap_err();
        assert!(matches!(error, ClientError::Parse(_)), "{error}");
        assert!(error.to_string().contains("students[0]"), "{error}");
        assert_eq!(error.user_message(), crate::error::GENERIC_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn html_error_pages_are_parse_failures() {
        let transport = MockTransport::default();
        transport.reply(AVAILABILITY_SLOT_PATH, MockReply::ok("<html>502</html>"));
        let api = BookingApi::new(transport);
        let query: AvailabilityQuery = serde_json::from_value(serde_json::json!({
            "type": "練琴", "district": "灣仔", "date": "2024-05-01"
        }))
        .unwrap();

        let error = api.availability_slots("t", &query).await.unwrap_err();
        assert!(matches!(error, ClientError::Parse(_)), "{error}");
    }

    #[test]
    fn profile_paths_follow_role() {
        assert_eq!(profile_path(UserRole::ShopOwner), "/api/shop-owners/profile");
    }
}
