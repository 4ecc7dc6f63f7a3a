use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub id: u32,
    pub badge: &'static str,
    pub title: &'static str,
    pub provider: &'static str,
    pub rating: f64,
    pub reviews: u32,
    pub level: &'static str,
    pub duration: &'static str,
    pub image: &'static str,
}

const fn course(
    id: u32,
    title: &'static str,
    provider: &'static str,
    rating: f64,
    reviews: u32,
    level: &'static str,
    duration: &'static str,
    image: &'static str,
) -> Course {
    Course { id, badge: "Free Trial", title, provider, rating, reviews, level, duration, image }
}

const COURSES: [Course; 12] = [
    course(1, "Google AI Essentials", "Google", 4.8, 2156, "Beginner", "3 weeks", "🔍"),
    course(2, "Google Prompt Engineering Essentials", "Google", 4.7, 1890, "Beginner", "2 weeks", "✍️"),
    course(3, "What is Generative AI?", "Google", 4.8, 3456, "Beginner", "1 week", "💡"),
    course(4, "Generative AI for Developers", "Google", 4.7, 2341, "Intermediate", "5 weeks", "👨‍💻"),
    course(5, "GPT Models and Fine-tuning", "OpenAI", 4.9, 3124, "Intermediate", "6 weeks", "🤖"),
    course(6, "Building with ChatGPT API", "OpenAI", 4.8, 2789, "Intermediate", "4 weeks", "⚙️"),
    course(7, "Advanced Prompt Engineering", "OpenAI", 4.7, 1923, "Advanced", "5 weeks", "🎯"),
    course(8, "Machine Learning Specialization", "Stanford", 4.9, 4567, "Intermediate", "12 weeks", "🎓"),
    course(9, "Deep Learning Fundamentals", "Stanford", 4.8, 3890, "Intermediate", "8 weeks", "🧠"),
    course(10, "Natural Language Processing", "Stanford", 4.7, 2345, "Advanced", "10 weeks", "💬"),
    course(13, "IBM Watson AI Fundamentals", "IBM", 4.7, 2890, "Beginner", "5 weeks", "💼"),
    course(15, "AI Ethics and Governance", "IBM", 4.8, 2234, "Intermediate", "4 weeks", "⚖️"),
];

/// Catalog cards, optionally narrowed to one provider (case-insensitive).
pub fn courses(provider: Option<&str>) -> Vec<Course> {
    COURSES
        .iter()
        .filter(|c| provider.map_or(true, |p| c.provider.eq_ignore_ascii_case(p.trim())))
        .cloned()
        .collect()
}

pub fn providers() -> Vec<&'static str> {
    let mut providers: Vec<&'static str> = COURSES.iter().map(|c| c.provider).collect();
    providers.dedup();
    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_by_provider() {
        assert_eq!(courses(None).len(), COURSES.len());
        let stanford = courses(Some("stanford"));
        assert_eq!(stanford.len(), 3);
        assert!(stanford.iter().all(|c| c.provider == "Stanford"));
        assert!(courses(Some("Unknown U")).is_empty());
    }

    #[test]
    fn test_providers_in_catalog_order() {
        assert_eq!(providers(), vec!["Google", "OpenAI", "Stanford", "IBM"]);
    }
}
