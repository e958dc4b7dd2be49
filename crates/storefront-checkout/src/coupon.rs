//! # Coupon Service
//!
//! Looks up a code and turns it into a discount rate. Nothing here ever fails
//! a checkout: a missing, inactive or unsupported coupon just means no
//! discount.

use tracing::{debug, info};

use storefront_core::coupon::{self, normalize_code};
use storefront_core::{Coupon, CouponApplication, CouponRejection};
use storefront_db::{CouponRepository, Database};

use crate::error::CheckoutResult;

#[derive(Debug, Clone)]
pub struct CouponService {
    coupons: CouponRepository,
}

impl CouponService {
    pub fn new(db: &Database) -> Self {
        CouponService {
            coupons: db.coupons(),
        }
    }

    /// Raw lookup, `None` when the code does not exist.
    pub async fn lookup(&self, code: &str) -> CheckoutResult<Option<Coupon>> {
        let Some(code) = normalize_code(code) else {
            return Ok(None);
        };

        Ok(self.coupons.find_by_code(&code).await?)
    }

    /// Looks up and evaluates a code.
    ///
    /// A blank or absent code is `NotApplied(NotFound)`.
    pub async fn apply(&self, code: Option<&str>) -> CheckoutResult<CouponApplication> {
        let Some(raw) = code else {
            return Ok(CouponApplication::NotApplied(CouponRejection::NotFound));
        };

        let found = self.lookup(raw).await?;
        let application = coupon::evaluate(found.as_ref());

        match &application {
            CouponApplication::Applied { code, rate } => {
                info!(code = %code, percent = %rate.percentage(), "Coupon applied");
            }
            CouponApplication::NotApplied(reason) => {
                debug!(code = %raw.trim(), ?reason, "Coupon not applied");
            }
        }

        Ok(application)
    }
}
