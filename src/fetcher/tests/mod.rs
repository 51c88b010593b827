use super::test_helpers::*;
use super::*;
use crate::error::ToHttpStatus;
use crate::types::{Event, ResourceState};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
