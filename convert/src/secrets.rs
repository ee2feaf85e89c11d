use callid::{ID, SECRET};
use llb_compat::Vertex;
use tracing::debug;

use crate::convert::{unsupported, Converter};
use crate::UnsupportedOpError;

impl Converter<'_> {
    /// Looks up the identifier an LLB secret id is mapped to.
    ///
    /// Unmapped optional secrets resolve to [None] and are left out by the
    /// caller. Unmapped required secrets are an error.
    pub(crate) fn resolve_secret(
        &self,
        vertex: &Vertex,
        op_type: &str,
        id: &str,
        optional: bool,
    ) -> Result<Option<ID>, UnsupportedOpError> {
        if id.is_empty() {
            if optional {
                return Ok(None);
            }
            return Err(unsupported(vertex, op_type, "secret id is empty"));
        }

        if let Some(secret) = self.options.secrets.get(id) {
            if secret.return_type().named_type() != SECRET {
                return Err(unsupported(
                    vertex,
                    op_type,
                    format!(
                        "mapped secret {:?} has non-Secret type {:?}",
                        id,
                        secret.return_type().to_string()
                    ),
                ));
            }
            return Ok(Some(secret.clone()));
        }

        if optional {
            debug!(secret.id = id, "skipping unmapped optional secret");
            return Ok(None);
        }

        if self.options.secrets.is_empty() {
            return Err(unsupported(
                vertex,
                op_type,
                format!(
                    "secret {:?} is required but no secret mappings were provided",
                    id
                ),
            ));
        }
        Err(unsupported(
            vertex,
            op_type,
            format!("secret {:?} is required but was not provided", id),
        ))
    }
}
