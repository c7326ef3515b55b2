//! Wire messages for the standard `grpc.health.v1` health-check service.
//!
//! Written by hand against the published proto so the crate needs no
//! build-time code generation for a two-field service.

/// Request for `grpc.health.v1.Health/Check`.
///
/// An empty `service` asks about the server as a whole.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckRequest {
    /// The service to query, or empty for the overall server.
    #[prost(string, tag = "1")]
    pub service: ::prost::alloc::string::String,
}

/// Response for `grpc.health.v1.Health/Check`.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct HealthCheckResponse {
    /// The serving status, as a [`ServingStatus`] value.
    #[prost(enumeration = "ServingStatus", tag = "1")]
    pub status: i32,
}

/// Serving status reported by the health-check service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ServingStatus {
    /// Status could not be determined.
    Unknown = 0,
    /// The service is up and serving.
    Serving = 1,
    /// The service is up but not serving.
    NotServing = 2,
    /// The queried service name is not known to the server.
    ///
    /// Only used by the streaming Watch method per the health proto, but
    /// kept so the enum matches the published definition.
    ServiceUnknown = 3,
}

impl ServingStatus {
    /// Decode a wire value, mapping anything unexpected to `Unknown`.
    pub fn from_wire(value: i32) -> Self {
        Self::try_from(value).unwrap_or(Self::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_request_encoding() {
        let request = HealthCheckRequest {
            service: "strata.catalog.v1.Catalog".to_string(),
        };
        let bytes = request.encode_to_vec();

        let decoded = HealthCheckRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.service, "strata.catalog.v1.Catalog");
    }

    #[test]
    fn test_response_status_decoding() {
        let response = HealthCheckResponse {
            status: ServingStatus::Serving as i32,
        };
        let bytes = response.encode_to_vec();

        let decoded = HealthCheckResponse::decode(bytes.as_slice()).unwrap();
        assert_eq!(ServingStatus::from_wire(decoded.status), ServingStatus::Serving);
    }

    #[test]
    fn test_unknown_wire_value() {
        assert_eq!(ServingStatus::from_wire(42), ServingStatus::Unknown);
        assert_eq!(ServingStatus::from_wire(2), ServingStatus::NotServing);
    }
}
