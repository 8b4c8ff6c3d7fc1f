use std::path::PathBuf;
use crate::model::object::ObjectKind;

error_chain! {

    foreign_links {
        Io(::std::io::Error);
        Encoding(::std::str::Utf8Error);
        Config(::serde_json::Error);
    }

    errors {
        BadId(id: String) {
            description("invalid object id")
            display("invalid object id {:?}", id)
        }
        NotFound(what: String) {
            description("not found")
            display("{} not found", what)
        }
        Corrupt(reason: String) {
            description("corrupt repository data")
            display("corrupt data: {}", reason)
        }
        UnsupportedFormat(reason: String) {
            description("unsupported format")
            display("unsupported format: {}", reason)
        }
        TypeMismatch(expected: ObjectKind, found: ObjectKind) {
            description("object type mismatch")
            display("expected {} object, found {}", expected, found)
        }
        InvalidRepository(path: PathBuf) {
            display("{:?} is not a valid repository", path)
        }
    }
}

pub(crate) fn corrupt<S: Into<String>>(reason: S) -> Error {
    ErrorKind::Corrupt(reason.into()).into()
}

impl Error {
    /// True when the error only means "try the next lookup strategy".
    pub fn is_not_found(&self) -> bool {
        match self.kind() {
            ErrorKind::NotFound(_) => true,
            _ => false,
        }
    }
}
