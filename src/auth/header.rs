use pom::utf8::{any, end, seq, sym, Parser};

#[derive(Debug, PartialEq, Eq)]
pub enum AuthHeader<'a> {
    Bearer { token: &'a str },
}

fn bearer<'a>() -> Parser<'a, AuthHeader<'a>> {
    let tag = seq("Bearer");
    let space = sym(' ').repeat(1..);
    let rest = any().repeat(1..).collect();

    ((tag + space) * rest - end())
        .map(|token| AuthHeader::Bearer { token })
        .name("bearer auth")
}

pub fn auth_header<'a>() -> Parser<'a, AuthHeader<'a>> {
    bearer().name("auth header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_valid() {
        let input = "Bearer 9f2c1d-cron-secret";
        let result = auth_header().parse_str(input);

        assert_eq!(
            result,
            Ok(AuthHeader::Bearer {
                token: "9f2c1d-cron-secret"
            })
        );
    }

    #[test]
    fn test_bearer_invalid() {
        // Missing space after Bearer
        assert!(auth_header().parse_str("Bearer9f2c1d").is_err());

        // Empty token
        assert!(auth_header().parse_str("Bearer ").is_err());

        // Unknown scheme
        assert!(auth_header().parse_str("Basic dXNlcjpwYXNz").is_err());
    }
}
