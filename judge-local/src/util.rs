use crate::prelude::*;

pub fn load_file<P: AsRef<Path>>(path: P) -> Result<String> {
    info!(
        "loading file {}",
        path.as_ref().to_str().unwrap_or("[non UTF-8 path]")
    );
    std::fs::read_to_string(path).map_err(Error::IOError)
}
