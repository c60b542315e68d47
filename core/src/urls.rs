use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Top-level dashboard sections and their path below the community base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardSection {
    Home,
    Segments,
    Search,
    Contacts,
    Organizations,
    Prospector,
    Activity,
    TeamAlerts,
    Workflows,
    Reporting,
    Settings,
}

impl DashboardSection {
    pub const ALL: [DashboardSection; 11] = [
        DashboardSection::Home,
        DashboardSection::Segments,
        DashboardSection::Search,
        DashboardSection::Contacts,
        DashboardSection::Organizations,
        DashboardSection::Prospector,
        DashboardSection::Activity,
        DashboardSection::TeamAlerts,
        DashboardSection::Workflows,
        DashboardSection::Reporting,
        DashboardSection::Settings,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DashboardSection::Home => "home",
            DashboardSection::Segments => "segments",
            DashboardSection::Search => "search",
            DashboardSection::Contacts => "contacts",
            DashboardSection::Organizations => "organizations",
            DashboardSection::Prospector => "prospector",
            DashboardSection::Activity => "activity",
            DashboardSection::TeamAlerts => "team_alerts",
            DashboardSection::Workflows => "workflows",
            DashboardSection::Reporting => "reporting",
            DashboardSection::Settings => "settings",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            DashboardSection::Home => "home",
            DashboardSection::Segments => "segments",
            DashboardSection::Search => "search",
            DashboardSection::Contacts => "members",
            DashboardSection::Organizations => "organizations",
            DashboardSection::Prospector => "prospector",
            DashboardSection::Activity => "activities",
            DashboardSection::TeamAlerts => "alerts",
            DashboardSection::Workflows => "workflows",
            DashboardSection::Reporting => "reports",
            DashboardSection::Settings => "settings",
        }
    }
}

/// Deep-link builder for the Common Room web dashboard.
///
/// Every builder checks for a configured base URL before templating, so an
/// unconfigured deployment yields [`Error::Configuration`] instead of a
/// URL with an empty host segment.
#[derive(Debug, Clone, Copy)]
pub struct DashboardUrls<'a> {
    base_url: Option<&'a str>,
}

impl<'a> DashboardUrls<'a> {
    pub fn new(base_url: Option<&'a str>) -> Self {
        Self { base_url }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn base(&self) -> Result<&'a str> {
        self.base_url.ok_or_else(|| {
            Error::configuration(
                "COMMONROOM_BASE_URL not configured. Set it in your environment or .env file \
                 (e.g. https://app.commonroom.io/community/your-community-id)",
            )
        })
    }

    /// `{base}/{section}/{id}/{id}...`
    pub fn build_url(&self, section: &str, ids: &[&str]) -> Result<String> {
        let base = self.base()?;
        let mut url = format!("{base}/{section}");
        for id in ids {
            url.push('/');
            url.push_str(id);
        }
        Ok(url)
    }

    pub fn member_url(&self, user_id: &str, show_activity: bool) -> Result<String> {
        if show_activity {
            self.build_url("member", &[user_id, "activity"])
        } else {
            self.build_url("member", &[user_id])
        }
    }

    pub fn member_activity_url(&self, user_id: &str) -> Result<String> {
        self.member_url(user_id, true)
    }

    pub fn organization_url(&self, org_id: &str) -> Result<String> {
        self.build_url("organization", &[org_id])
    }

    pub fn segment_url(&self, segment_id: &str) -> Result<String> {
        self.build_url("segment", &[segment_id])
    }

    /// Section name -> absolute URL for every [`DashboardSection`].
    pub fn sections(&self) -> Result<BTreeMap<&'static str, String>> {
        let base = self.base()?;
        Ok(DashboardSection::ALL
            .iter()
            .map(|section| (section.key(), format!("{base}/{}", section.path())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://app.commonroom.io/community/8683-amazon-developer";

    #[test]
    fn member_url_overview_and_activity() {
        let urls = DashboardUrls::new(Some(BASE));
        assert_eq!(
            urls.member_url("226882839", false).unwrap(),
            format!("{BASE}/member/226882839")
        );
        assert_eq!(
            urls.member_url("226882839", true).unwrap(),
            format!("{BASE}/member/226882839/activity")
        );
    }

    #[test]
    fn member_activity_url_matches_flagged_member_url() {
        let urls = DashboardUrls::new(Some(BASE));
        assert_eq!(
            urls.member_activity_url("226882839").unwrap(),
            urls.member_url("226882839", true).unwrap()
        );
    }

    #[test]
    fn organization_and_segment_urls() {
        let urls = DashboardUrls::new(Some(BASE));
        assert_eq!(
            urls.organization_url("414214-td").unwrap(),
            format!("{BASE}/organization/414214-td")
        );
        assert_eq!(
            urls.segment_url("5627821-combo-kepler-developer-outreach-for-unboxing")
                .unwrap(),
            format!("{BASE}/segment/5627821-combo-kepler-developer-outreach-for-unboxing")
        );
    }

    #[test]
    fn build_url_is_deterministic() {
        let urls = DashboardUrls::new(Some(BASE));
        let first = urls.build_url("member", &["1"]).unwrap();
        let second = urls.build_url("member", &["1"]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unconfigured_base_url_is_a_configuration_error() {
        let urls = DashboardUrls::new(None);
        assert!(!urls.is_configured());
        for result in [
            urls.member_url("1", false),
            urls.member_activity_url("1"),
            urls.organization_url("1"),
            urls.segment_url("1"),
        ] {
            let err = result.expect_err("missing base url must fail");
            assert!(matches!(err, Error::Configuration(_)));
            assert!(err.to_string().contains("COMMONROOM_BASE_URL"));
        }
        assert!(matches!(urls.sections(), Err(Error::Configuration(_))));
    }

    #[test]
    fn sections_cover_every_dashboard_area() {
        let sections = DashboardUrls::new(Some(BASE)).sections().unwrap();
        assert_eq!(sections.len(), DashboardSection::ALL.len());
        assert_eq!(sections["home"], format!("{BASE}/home"));
        assert_eq!(sections["contacts"], format!("{BASE}/members"));
        assert_eq!(sections["activity"], format!("{BASE}/activities"));
        assert_eq!(sections["team_alerts"], format!("{BASE}/alerts"));
        assert_eq!(sections["reporting"], format!("{BASE}/reports"));
    }
}
