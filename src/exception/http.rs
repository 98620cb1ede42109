use crate::common::{ErrorBody, ErrorCode};
use crate::dispatch::{HandlerError, RequestCancelled};
use crate::exception::{ExceptionFilter, HttpException};
use crate::http::{HttpRequest, HttpResponse};

/// A default exception filter that handles common errors
///
/// [`HttpException`] keeps its own status and message; a cancelled request
/// maps to 499; anything else is a 500 whose message is not exposed.
#[derive(Debug, Default)]
pub struct HttpExceptionFilter;

impl ExceptionFilter for HttpExceptionFilter {
    fn catch(&self, error: &HandlerError, request: &HttpRequest, response: &mut HttpResponse) {
        if response.is_sent() {
            tracing::debug!(
                method = %request.method(),
                path = %request.path(),
                error = %error,
                "Response already sent, exception dropped"
            );
            return;
        }

        let body = if let Some(exception) = error.downcast_ref::<HttpException>() {
            ErrorBody::with_status(exception.status, exception.message.clone())
        } else if error.is::<RequestCancelled>() {
            ErrorBody::new(ErrorCode::RequestCancelled, error.to_string())
        } else {
            tracing::error!(
                method = %request.method(),
                path = %request.path(),
                error = %error,
                "Unhandled exception"
            );
            ErrorBody::new(ErrorCode::InternalServerError, "Internal server error")
        };

        let status = body.status();
        if status.is_client_error() {
            tracing::warn!(
                method = %request.method(),
                path = %request.path(),
                status = status.as_u16(),
                message = %body.message,
                "Request failed"
            );
        }
        response.send_json(status, &body.timestamped());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};

    fn catch(error: HandlerError, response: &mut HttpResponse) {
        let request = HttpRequest::new(Method::GET, "/items/9");
        HttpExceptionFilter.catch(&error, &request, response);
    }

    #[test]
    fn test_http_exception_keeps_status() {
        let mut response = HttpResponse::default();
        catch(Box::new(HttpException::not_found("Item 9 not found")), &mut response);

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.json().unwrap();
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["message"], "Item 9 not found");
        assert!(body["timestamp"].is_string());
    }

    #[test]
    fn test_unknown_error_is_500_without_details() {
        let mut response = HttpResponse::default();
        catch("database password is hunter2".into(), &mut response);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.json().unwrap();
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["error"], "InternalServerError");
    }

    #[test]
    fn test_cancelled_request() {
        let mut response = HttpResponse::default();
        catch(Box::new(RequestCancelled), &mut response);
        assert_eq!(response.status().as_u16(), 499);
    }

    #[test]
    fn test_sent_response_is_left_alone() {
        let mut response = HttpResponse::default();
        response.send(StatusCode::ACCEPTED, "text/plain", "streamed");
        catch(Box::new(HttpException::conflict("late")), &mut response);

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.text(), "streamed");
    }
}
