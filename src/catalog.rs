use serde::{Deserialize, Serialize};

/// Option label that unlocks the free-text answer in survey questions.
pub const CUSTOM_OPTION: &str = "Свой вариант";

/// Department marker stored for diagnostic submissions.
pub const DIAGNOSTIC_DEPARTMENT: &str = "diagnostic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryId {
    Data,
    Processes,
    People,
    Results,
}

impl CategoryId {
    pub const ALL: [CategoryId; 4] = [
        CategoryId::Data,
        CategoryId::Processes,
        CategoryId::People,
        CategoryId::Results,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryId::Data => "data",
            CategoryId::Processes => "processes",
            CategoryId::People => "people",
            CategoryId::Results => "results",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }

    /// Category score strictly below this value raises the category warning.
    pub fn warning_below(self) -> u8 {
        match self {
            CategoryId::Data | CategoryId::Results => 4,
            CategoryId::Processes | CategoryId::People => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    pub text: &'static str,
    pub category: CategoryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<&'static str>,
    #[serde(skip_serializing_if = "no_examples")]
    pub examples: &'static [&'static str],
}

fn no_examples(v: &&'static [&'static str]) -> bool {
    v.is_empty()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: &'static str,
    pub emoji: &'static str,
    pub description: &'static str,
    pub warning_threshold: &'static str,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingLevel {
    pub value: u8,
    pub label: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandLevel {
    HighRisk,
    Preparation,
    Ready,
}

impl BandLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            BandLevel::HighRisk => "high-risk",
            BandLevel::Preparation => "preparation",
            BandLevel::Ready => "ready",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high-risk" => Some(BandLevel::HighRisk),
            "preparation" => Some(BandLevel::Preparation),
            "ready" => Some(BandLevel::Ready),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub min: u8,
    pub max: u8,
    pub range: &'static str,
    pub level: BandLevel,
    pub emoji: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub recommendations: &'static [&'static str],
}

/// Long-form category text used by the PDF report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetail {
    pub id: CategoryId,
    pub emoji: &'static str,
    pub name: &'static str,
    pub full_description: &'static str,
    pub warning_text: &'static str,
    pub detailed_warning: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyQuestion {
    pub id: u32,
    pub text: String,
    pub options: Vec<String>,
    pub multiple: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySection {
    pub position: String,
    pub questions: Vec<SurveyQuestion>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub sections: Vec<SurveySection>,
}

fn q(id: u32, category: CategoryId, text: &'static str) -> Question {
    Question {
        id,
        text,
        category,
        explanation: None,
        examples: &[],
    }
}

pub fn categories() -> Vec<Category> {
    use CategoryId::*;
    vec![
        Category {
            id: Data,
            name: "ДАННЫЕ",
            emoji: "📊",
            description: "Оценка качества и доступности данных в вашей компании",
            warning_threshold: "Если меньше 4 → ИИ будет работать на некачественных данных",
            questions: vec![
                Question {
                    explanation: Some(
                        "Насколько сбор данных зависит от ручного ввода и отдельных сотрудников.",
                    ),
                    examples: &[
                        "Заявки попадают в CRM автоматически с сайта",
                        "Отчеты собираются вручную из нескольких таблиц",
                    ],
                    ..q(1, Data, "Сбор: Данные собираются автоматически из надежных источников")
                },
                q(2, Data, "Качество: Минимум ошибок, регулярная очистка данных"),
                q(3, Data, "Доступность: Нужные данные можно получить быстро без участия IT"),
                q(4, Data, "Интеграция: Данные из разных систем легко сопоставляются"),
            ],
        },
        Category {
            id: Processes,
            name: "ПРОЦЕССЫ",
            emoji: "⚙️",
            description: "Оценка стандартизации и эффективности бизнес-процессов",
            warning_threshold: "Если меньше 3 → сначала нужно стандартизировать процесс",
            questions: vec![
                q(5, Processes, "Описание: Процесс четко документирован, есть регламенты"),
                q(6, Processes, "Стабильность: Результат процесса предсказуем"),
                q(7, Processes, "Измеримость: Есть KPI для оценки эффективности"),
                q(
                    8,
                    Processes,
                    "Повторяемость: Процесс выполняется одинаково разными сотрудниками",
                ),
            ],
        },
        Category {
            id: People,
            name: "ЛЮДИ",
            emoji: "👥",
            description: "Оценка готовности команды к внедрению изменений",
            warning_threshold: "Если меньше 3 → высокий риск сопротивления внедрению",
            questions: vec![
                q(9, People, "Компетенции: Сотрудники имеют навыки работы с данными"),
                q(10, People, "Мотивация: Команда готова к изменениям и автоматизации"),
                q(11, People, "Взаимодействие: Четкое разделение зон ответственности"),
                q(12, People, "Обучение: Регулярное повышение квалификации сотрудников"),
            ],
        },
        Category {
            id: Results,
            name: "РЕЗУЛЬТАТЫ",
            emoji: "🎯",
            description: "Оценка измеримости и мониторинга результатов",
            warning_threshold: "Если меньше 4 → будет сложно оценить эффект от внедрения ИИ",
            questions: vec![
                q(
                    13,
                    Results,
                    "Измеримость: Результаты процесса можно количественно оценить",
                ),
                q(14, Results, "Целеполагание: Есть четкие цели для автоматизации"),
                q(15, Results, "Мониторинг: Эффективность процесса регулярно отслеживается"),
                q(16, Results, "Оптимизация: Процесс постоянно анализируется и улучшается"),
            ],
        },
    ]
}

/// Diagnostic questions flattened in presentation order.
pub fn diagnostic_questions() -> Vec<Question> {
    categories().into_iter().flat_map(|c| c.questions).collect()
}

pub fn rating_scale() -> Vec<RatingLevel> {
    vec![
        RatingLevel {
            value: 1,
            label: "Полный хаос",
            description: "Процесс не описан, каждый работает по-своему",
        },
        RatingLevel {
            value: 2,
            label: "Начальная стадия",
            description: "Есть понимание проблемы, но нет системного подхода",
        },
        RatingLevel {
            value: 3,
            label: "Частичная стандартизация",
            description: "Есть базовые правила, но много исключений",
        },
        RatingLevel {
            value: 4,
            label: "Хорошая организация",
            description: "Процесс в основном формализован и работает стабильно",
        },
        RatingLevel {
            value: 5,
            label: "Идеальная система",
            description: "Процесс полностью формализован и постоянно улучшается",
        },
    ]
}

pub fn interpretations() -> [Interpretation; 3] {
    [
        Interpretation {
            min: 0,
            max: 8,
            range: "0-8",
            level: BandLevel::HighRisk,
            emoji: "🔴",
            title: "Зона высокого риска",
            description: "Внедрение ИИ приведет к увеличению хаоса. Сначала нужно:",
            recommendations: &[
                "Стандартизировать ключевые процессы",
                "Наладить сбор и качество данных",
                "Подготовить команду к изменениям",
            ],
        },
        Interpretation {
            min: 9,
            max: 14,
            range: "9-14",
            level: BandLevel::Preparation,
            emoji: "🟡",
            title: "Зона подготовки",
            description: "Есть потенциал для внедрения ИИ, но требуется предварительная работа:",
            recommendations: &[
                "Выберите 1-2 процесса с наибольшими баллами для пилота",
                "Разработайте дорожную карту улучшения слабых мест",
                "Начните с автоматизации простых, повторяющихся задач",
            ],
        },
        Interpretation {
            min: 15,
            max: 20,
            range: "15-20",
            level: BandLevel::Ready,
            emoji: "🟢",
            title: "Зона готовности",
            description: "Ваша компания готова к системному внедрению ИИ:",
            recommendations: &[
                "Можно начинать с комплексных проектов",
                "Фокус на предиктивной аналитике и оптимизации",
                "Быстрое получение измеримых результатов",
            ],
        },
    ]
}

pub fn interpretation_for(level: BandLevel) -> Interpretation {
    let all = interpretations();
    match level {
        BandLevel::HighRisk => all[0].clone(),
        BandLevel::Preparation => all[1].clone(),
        BandLevel::Ready => all[2].clone(),
    }
}

pub fn category_details() -> Vec<CategoryDetail> {
    use CategoryId::*;
    vec![
        CategoryDetail {
            id: Data,
            emoji: "📊",
            name: "Данные",
            full_description: "Качество, полнота и доступность данных определяют, на чем будет учиться и работать ИИ. Автоматический сбор, регулярная очистка и единые справочники позволяют получать предсказуемый результат без ручной подготовки.",
            warning_text: "Риск некачественных данных",
            detailed_warning: "При текущем уровне данных модели будут воспроизводить ошибки исходных систем. Начните с инвентаризации источников, назначьте владельцев данных и настройте регулярную проверку качества.",
        },
        CategoryDetail {
            id: Processes,
            emoji: "⚙️",
            name: "Процессы",
            full_description: "Стандартизированный и описанный процесс можно автоматизировать по частям и измерить эффект. Если каждый сотрудник выполняет работу по-своему, ИИ закрепит хаос вместо того, чтобы его устранить.",
            warning_text: "Процессы требуют стандартизации",
            detailed_warning: "Перед внедрением ИИ опишите целевой процесс, зафиксируйте регламент и определите KPI. Автоматизация нестабильного процесса увеличивает количество исключений и ручных исправлений.",
        },
        CategoryDetail {
            id: People,
            emoji: "👥",
            name: "Люди",
            full_description: "Готовность команды к изменениям, навыки работы с данными и понятное распределение ответственности определяют, будет ли новый инструмент использоваться после пилота.",
            warning_text: "Высокий риск сопротивления изменениям",
            detailed_warning: "Вовлеките ключевых сотрудников в выбор пилотного процесса, запланируйте обучение и назначьте ответственного за внедрение. Без этого инструмент останется формальностью.",
        },
        CategoryDetail {
            id: Results,
            emoji: "🎯",
            name: "Результаты",
            full_description: "Измеримые цели и регулярный мониторинг позволяют доказать эффект от внедрения ИИ и принимать решения о масштабировании на основе цифр, а не ощущений.",
            warning_text: "Эффект будет сложно измерить",
            detailed_warning: "Зафиксируйте базовые показатели до старта проекта, определите целевые метрики и частоту их пересмотра. Без этого невозможно оценить окупаемость внедрения.",
        },
    ]
}

pub fn category_detail(id: CategoryId) -> Option<CategoryDetail> {
    category_details().into_iter().find(|d| d.id == id)
}

fn survey_question(id: u32, text: &str, options: &[&str], multiple: bool) -> SurveyQuestion {
    SurveyQuestion {
        id,
        text: text.to_string(),
        options: options.iter().map(|s| s.to_string()).collect(),
        multiple,
    }
}

fn manager_section(base_id: u32) -> SurveySection {
    SurveySection {
        position: "Руководитель".to_string(),
        questions: vec![
            survey_question(
                base_id + 1,
                "Какие задачи отдела вы бы в первую очередь передали ИИ?",
                &[
                    "Подготовка отчетов",
                    "Обработка входящих запросов",
                    "Анализ данных",
                    "Контроль сроков",
                    CUSTOM_OPTION,
                ],
                true,
            ),
            survey_question(
                base_id + 2,
                "Что сейчас мешает внедрению автоматизации?",
                &[
                    "Нет бюджета",
                    "Нет компетенций",
                    "Нет описанных процессов",
                    "Сопротивление команды",
                    CUSTOM_OPTION,
                ],
                true,
            ),
            survey_question(
                base_id + 3,
                "Как вы оцениваете готовность отдела к изменениям?",
                &["Низкая", "Средняя", "Высокая"],
                false,
            ),
        ],
    }
}

fn staff_section(base_id: u32) -> SurveySection {
    SurveySection {
        position: "Сотрудник".to_string(),
        questions: vec![
            survey_question(
                base_id + 4,
                "Сколько времени в день занимает рутинная работа?",
                &["Меньше часа", "1-3 часа", "Больше 3 часов"],
                false,
            ),
            survey_question(
                base_id + 5,
                "Какими ИИ-инструментами вы уже пользуетесь?",
                &[
                    "Чат-боты",
                    "Генерация текстов",
                    "Распознавание документов",
                    "Не пользуюсь",
                    CUSTOM_OPTION,
                ],
                true,
            ),
            survey_question(
                base_id + 6,
                "Какая помощь нужна вам для работы с ИИ?",
                &["Обучение", "Готовые инструкции", "Доступ к инструментам", CUSTOM_OPTION],
                false,
            ),
        ],
    }
}

pub fn departments() -> Vec<Department> {
    let defs: [(&str, &str, &str); 5] = [
        ("analytics", "Аналитики", "📈"),
        ("it", "IT отдел", "💻"),
        ("hr", "HR отдел", "🧑‍💼"),
        ("marketing", "Маркетинг", "📣"),
        ("legal", "Юридический", "⚖️"),
    ];
    defs.iter()
        .enumerate()
        .map(|(i, (id, name, emoji))| {
            let base = 100 * (i as u32 + 1);
            Department {
                id: id.to_string(),
                name: name.to_string(),
                emoji: emoji.to_string(),
                sections: vec![manager_section(base), staff_section(base)],
            }
        })
        .collect()
}

pub fn department(id: &str) -> Option<Department> {
    departments().into_iter().find(|d| d.id == id)
}
