use crate::proto;

pub const CONTAINER: &str = "Container";
pub const DIRECTORY: &str = "Directory";
pub const FILE: &str = "File";
pub const HOST: &str = "Host";
pub const GIT_REPOSITORY: &str = "GitRepository";
pub const GIT_REF: &str = "GitRef";
pub const CACHE_VOLUME: &str = "CacheVolume";
pub const SECRET: &str = "Secret";

/// The declared return type of a call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    named_type: String,
    elem: Option<Box<Type>>,
    non_null: bool,
}

impl Type {
    /// A non-null object type, like `Container!`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            named_type: name.into(),
            elem: None,
            non_null: true,
        }
    }

    /// A non-null list of the given element type.
    pub fn list_of(elem: Type) -> Self {
        Self {
            named_type: String::new(),
            elem: Some(Box::new(elem)),
            non_null: true,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.non_null = false;
        self
    }

    pub fn container() -> Self {
        Self::named(CONTAINER)
    }

    pub fn directory() -> Self {
        Self::named(DIRECTORY)
    }

    pub fn file() -> Self {
        Self::named(FILE)
    }

    pub fn host() -> Self {
        Self::named(HOST)
    }

    pub fn git_repository() -> Self {
        Self::named(GIT_REPOSITORY)
    }

    pub fn git_ref() -> Self {
        Self::named(GIT_REF)
    }

    pub fn cache_volume() -> Self {
        Self::named(CACHE_VOLUME)
    }

    pub fn secret() -> Self {
        Self::named(SECRET)
    }

    /// The name of the type, empty for list types.
    pub fn named_type(&self) -> &str {
        &self.named_type
    }

    pub fn elem(&self) -> Option<&Type> {
        self.elem.as_deref()
    }

    pub fn is_non_null(&self) -> bool {
        self.non_null
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.elem {
            Some(elem) => write!(f, "[{}]", elem)?,
            None => write!(f, "{}", self.named_type)?,
        }
        if self.non_null {
            write!(f, "!")?;
        }
        Ok(())
    }
}

impl From<&Type> for proto::Type {
    fn from(value: &Type) -> Self {
        proto::Type {
            named_type: value.named_type.clone(),
            elem: value.elem.as_deref().map(|e| Box::new(e.into())),
            non_null: value.non_null,
        }
    }
}

impl From<&proto::Type> for Type {
    fn from(value: &proto::Type) -> Self {
        Type {
            named_type: value.named_type.clone(),
            elem: value.elem.as_deref().map(|e| Box::new(e.into())),
            non_null: value.non_null,
        }
    }
}
