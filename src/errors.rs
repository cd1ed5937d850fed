use crate::pre::PreErrors;

use quick_error::quick_error;

quick_error! {
  #[derive(Debug)]
  pub enum ReaderErrors {
      Io(err: std::io::Error) {
        from()
        display("I/O error: {}", err)
        source(err)
      }
      Json(err: serde_json::Error) {
        from()
        display("Malformed JSON: {}", err)
        source(err)
      }
      Hex(err: hex::FromHexError) {
        from()
        display("Malformed hex string: {}", err)
        source(err)
      }
      Url(err: url::ParseError) {
        from()
        display("Malformed seed URI: {}", err)
        source(err)
      }
      Pre(err: PreErrors) {
        from()
        display("Re-encryption error: {}", err)
        source(err)
      }
      UnsupportedSeed(uri: String) {
        display("Seed node URI {} is not a usable https address", uri)
      }
      UnknownSeed(uri: String) {
        display("Seed node {} is not reachable", uri)
      }
      NotJoined(label: String) {
        display("No joined policy for label {:?}", label)
      }
      PolicyMismatch {
        display("The data source does not belong to the joined policy")
      }
      SenderMismatch {
        display("The message kit was not produced by the given data source")
      }
      InvalidSignature {
        display("The data source signature over the message does not verify")
      }
      InvalidKit(reason: &'static str) {
        display("Malformed message kit: {}", reason)
      }
      InvalidTimestamp {
        display("Timestamp is outside the range a message kit can carry")
      }
      NotEnoughCFrags { needed: usize, got: usize } {
        display("Needed {} cfrags but the network returned {}", needed, got)
      }
      TooManyNodes(size: usize) {
        display("A local network of {} nodes does not fit the port range", size)
      }
      NotEnoughNodes { needed: usize, got: usize } {
        display("Policy needs {} nodes but the network has {}", needed, got)
      }
      NoArrangement {
        display("No node holds a kfrag for this policy and recipient")
      }
  }
}

pub type Result<T> = std::result::Result<T, ReaderErrors>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_keep_the_cause() {
        let err: ReaderErrors = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, ReaderErrors::Hex(_)));
        assert!(std::error::Error::source(&err).is_some());

        let err: ReaderErrors = PreErrors::InvalidBytes.into();
        assert_eq!(
            err.to_string(),
            "Re-encryption error: The bytes given in input are not valid"
        );
    }
}
