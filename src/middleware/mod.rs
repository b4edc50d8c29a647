pub mod gate;
pub mod resolve;
pub mod response;

pub use gate::{authorize, authorize_role, require_admin, require_roles, GateError, RoleSet};
pub use resolve::{principal_middleware, PrincipalResolver, ResolveError, TOKEN_HEADER};
pub use response::{ApiResponse, ApiResult};
