//! Till prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{Cart, CartError, FeeUpdate, ItemUpdate},
    catalog::Purchasable,
    config::CartConfig,
    coupons::{
        BuyXGetYCoupon, Coupon, CouponCore, CouponError, CouponType, MinRequiredItemCoupon,
        MinRequiredShippingCoupon, OrderCoupon, ProductCoupon, ProductItemCoupon, ShippingCoupon,
        ShippingItemCoupon,
        discountable::{
            BuyXGetYDiscountable, Discountable, DiscountableIds, MinRequiredDiscountable,
            MinRequiredShippingDiscountable, RequiredSpend, ShippingDiscountable,
        },
    },
    events::{CartEvent, EventSink, NullSink, TracingSink},
    fee::{CartFee, FeePatch},
    item::{CartItem, ItemError, ItemPatch, MemberAttachment, RowId},
    member::{CartMember, MemberError},
    options::{AttributeValue, ItemOptions},
    store::{CartSnapshot, CartStore, InMemoryStore, StoreError},
    vouchers::{ItemVoucher, VoucherAttachment, VoucherDiscountable, VoucherError},
};
