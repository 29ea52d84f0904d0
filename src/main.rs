const MSG: &str = r#"
Connect2id Signed Request Client
================================
This project contains two binaries:
1. Verifier: a reference service that issues nonces and checks signed requests
2. Submit: a client that sends one nonce-signed JSON request

To run the verifier:
  cargo run --bin verifier

To send a signed request:
  cargo run --bin submit

See DESIGN.md for more details.
"#;

fn main() {
    println!("{}", MSG);
}
