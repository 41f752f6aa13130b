use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::MethodRouter;

use super::store::PermissionStore;
use crate::errors::AppError;
use crate::jwt::{bearer_token, AuthUser, JwtConfig};

/// Turns a bearer token plus a permission key into allow or deny.
#[derive(Clone)]
pub struct PermissionGate {
    jwt: Arc<JwtConfig>,
    store: Arc<dyn PermissionStore>,
    timeout: Duration,
}

impl PermissionGate {
    pub fn new(jwt: Arc<JwtConfig>, store: Arc<dyn PermissionStore>, timeout: Duration) -> Self {
        Self { jwt, store, timeout }
    }

    /// Verifies the token before the store is consulted. Store errors and
    /// timeouts deny with `Internal`.
    pub async fn authorize(&self, headers: &HeaderMap, permission: &str) -> Result<AuthUser, AppError> {
        let token = bearer_token(headers)?;
        let claims = self.jwt.decode(token)?;
        let xid = claims.sub;

        let check = self.store.user_has_permission(&xid, permission);
        let allowed = match tokio::time::timeout(self.timeout, check).await {
            Ok(Ok(allowed)) => allowed,
            Ok(Err(err)) => {
                tracing::error!(user = %xid, permission, error = %err, "permission check failed");
                return Err(AppError::internal(format!("permission check failed: {err}")));
            }
            Err(_) => {
                tracing::error!(user = %xid, permission, timeout_ms = self.timeout.as_millis() as u64, "permission check timed out");
                return Err(AppError::internal("permission check timed out"));
            }
        };

        if !allowed {
            tracing::debug!(user = %xid, permission, "permission denied");
            return Err(AppError::forbidden(format!("missing permission {permission}")));
        }

        tracing::debug!(user = %xid, permission, "permission granted");
        Ok(AuthUser { xid })
    }

    pub fn requirement(&self, permission: &'static str) -> Requirement {
        Requirement {
            gate: self.clone(),
            permission,
        }
    }

    /// Wraps every handler of `route` with a check for `permission`.
    pub fn guarded<S>(&self, permission: &'static str, route: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        route.route_layer(axum::middleware::from_fn_with_state(self.requirement(permission), enforce))
    }
}

/// Middleware state: the gate plus the key one route requires.
#[derive(Clone)]
pub struct Requirement {
    gate: PermissionGate,
    permission: &'static str,
}

/// On success the verified [`AuthUser`] is stored in the request extensions.
pub async fn enforce(State(requirement): State<Requirement>, mut request: Request, next: Next) -> Result<Response, AppError> {
    let user = requirement
        .gate
        .authorize(request.headers(), requirement.permission)
        .await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, HeaderValue, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::util::ServiceExt;

    use crate::jwt::Claims;
    use crate::models::rbac::{Permission, Role};

    /// In-memory store: user xid -> roles, role -> permission keys.
    #[derive(Default)]
    struct FakeStore {
        user_roles: HashMap<String, HashSet<String>>,
        role_permissions: HashMap<String, HashSet<String>>,
        delay: Option<Duration>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeStore {
        fn grant(mut self, xid: &str, role: &str, keys: &[&str]) -> Self {
            self.user_roles.entry(xid.into()).or_default().insert(role.into());
            let entry = self.role_permissions.entry(role.into()).or_default();
            entry.extend(keys.iter().map(|k| k.to_string()));
            self
        }
    }

    #[async_trait]
    impl PermissionStore for FakeStore {
        async fn create_role(&self, _: &str) -> Result<Role, AppError> {
            unimplemented!()
        }
        async fn create_permission(&self, _: &str, _: Option<&str>) -> Result<Permission, AppError> {
            unimplemented!()
        }
        async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
            unimplemented!()
        }
        async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
            unimplemented!()
        }
        async fn delete_role(&self, _: &str) -> Result<Role, AppError> {
            unimplemented!()
        }
        async fn delete_permission(&self, _: &str) -> Result<Permission, AppError> {
            unimplemented!()
        }
        async fn assign_permission_to_role(&self, _: &str, _: &str) -> Result<(), AppError> {
            unimplemented!()
        }
        async fn revoke_permission_from_role(&self, _: &str, _: &str) -> Result<(), AppError> {
            unimplemented!()
        }
        async fn assign_role_to_user(&self, _: &str, _: &str) -> Result<(), AppError> {
            unimplemented!()
        }
        async fn revoke_role_from_user(&self, _: &str, _: &str) -> Result<(), AppError> {
            unimplemented!()
        }
        async fn list_user_roles(&self, _: &str) -> Result<Vec<Role>, AppError> {
            unimplemented!()
        }

        async fn user_has_permission(&self, xid: &str, key: &str) -> Result<bool, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(AppError::internal("store offline"));
            }
            let Some(roles) = self.user_roles.get(xid) else {
                return Ok(false);
            };
            Ok(roles.iter().any(|role| {
                role == crate::authz::roles::ADMIN
                    || self.role_permissions.get(role).is_some_and(|keys| keys.contains(key))
            }))
        }
    }

    fn jwt() -> Arc<JwtConfig> {
        Arc::new(JwtConfig::new(b"gate-secret".to_vec(), 1, "catalog-api"))
    }

    fn headers_for(jwt: &JwtConfig, xid: &str) -> HeaderMap {
        let token = jwt.encode(xid).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
        headers
    }

    fn gate(store: FakeStore) -> (PermissionGate, Arc<FakeStore>) {
        let store = Arc::new(store);
        let gate = PermissionGate::new(jwt(), store.clone(), Duration::from_millis(200));
        (gate, store)
    }

    #[tokio::test]
    async fn admin_passes_any_permission() {
        let (gate, _) = gate(FakeStore::default().grant("boss", "admin", &[]));
        let headers = headers_for(&gate.jwt, "boss");

        let user = gate.authorize(&headers, "anything.at.all").await.unwrap();
        assert_eq!(user.xid, "boss");
    }

    #[tokio::test]
    async fn linked_permission_allows_and_others_are_forbidden() {
        let (gate, _) = gate(FakeStore::default().grant("ed", "editor", &["products.write"]));
        let headers = headers_for(&gate.jwt, "ed");

        assert!(gate.authorize(&headers, "products.write").await.is_ok());
        let denied = gate.authorize(&headers, "products.delete").await.unwrap_err();
        assert!(matches!(denied, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn unknown_user_is_forbidden_not_an_error() {
        let (gate, _) = gate(FakeStore::default());
        let headers = headers_for(&gate.jwt, "ghost");

        let err = gate.authorize(&headers, "products.read").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn expired_token_never_reaches_the_store() {
        let (gate, store) = gate(FakeStore::default().grant("boss", "admin", &[]));
        let now = chrono::Utc::now().timestamp();
        let token = gate
            .jwt
            .encode_claims(&Claims {
                sub: "boss".into(),
                iat: now - 7200,
                exp: now - 1,
                iss: "catalog-api".into(),
            })
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());

        let err = gate.authorize(&headers, "products.read").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_token_is_unauthenticated() {
        let (gate, store) = gate(FakeStore::default());
        let err = gate.authorize(&HeaderMap::new(), "products.read").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_store_fails_closed() {
        let store = FakeStore {
            delay: Some(Duration::from_secs(5)),
            ..FakeStore::default().grant("boss", "admin", &[])
        };
        let (gate, _) = gate(store);
        let headers = headers_for(&gate.jwt, "boss");

        let err = gate.authorize(&headers, "products.read").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn store_error_is_internal() {
        let store = FakeStore {
            fail: true,
            ..FakeStore::default()
        };
        let (gate, _) = gate(store);
        let headers = headers_for(&gate.jwt, "boss");

        let err = gate.authorize(&headers, "products.read").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn guarded_route_maps_decisions_to_status_codes() {
        let (gate, _) = gate(FakeStore::default().grant("ed", "editor", &["products.read"]));
        let jwt = gate.jwt.clone();

        async fn whoami(axum::Extension(user): axum::Extension<AuthUser>) -> String {
            user.xid
        }

        let app: Router = Router::new()
            .route("/read", gate.guarded("products.read", get(whoami)))
            .route("/write", gate.guarded("products.write", get(whoami)));

        let token = jwt.encode("ed").unwrap();
        let call = |path: &'static str, auth: Option<String>| {
            let mut builder = axum::http::Request::builder().uri(path);
            if let Some(token) = auth {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            builder.body(Body::empty()).unwrap()
        };

        let ok = app.clone().oneshot(call("/read", Some(token.clone()))).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let forbidden = app.clone().oneshot(call("/write", Some(token))).await.unwrap();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let anonymous = app.oneshot(call("/read", None)).await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }
}
