//! Domain models for the agency service.

pub mod agency;
pub mod invitation;
pub mod membership;
pub mod notification;

pub use agency::{Agency, NewAgency, NewSubAccount, SubAccount, UpdateAgencyDetails};
pub use invitation::{Invitation, InvitationStatus, NewInvitation};
pub use membership::{
    Membership, MembershipOverview, NewMembership, NewPermission, Permission, Role,
};
pub use notification::{NewNotification, Notification, NotificationFeed};
