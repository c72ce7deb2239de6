use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::CouponStatus;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

/// Admin coupon listing. Paging fields are declared inline because query
/// strings do not survive `serde(flatten)` for numeric fields.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CouponListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<CouponStatus>,
}

impl CouponListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_clamps_page_and_size() {
        let pagination = Pagination {
            page: Some(0),
            per_page: Some(500),
        };
        assert_eq!(pagination.normalize(), (1, 100, 0));
    }

    #[test]
    fn normalize_computes_offset() {
        let pagination = Pagination {
            page: Some(3),
            per_page: Some(10),
        };
        assert_eq!(pagination.normalize(), (3, 10, 20));
    }
}
